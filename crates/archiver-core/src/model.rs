//! # Data Model
//!
//! The types persisted and exchanged across the archiver pipeline: repository
//! records, references, rooted archives, and jobs.

use std::fmt;

use gix::ObjectId;
use serde::{Deserialize, Serialize};

//================================================================================================
// Types
//================================================================================================

/// A stable 128-bit identifier for a tracked repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepositoryId([u8; 16]);

/// The hash of a root commit (a commit with no parents), used to key a
/// [`RootedArchive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootHash(ObjectId);

/// Tri-state indicator of whether a repository is believed to be a fork.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForkStatus {
    /// Known to be a fork.
    Fork,
    /// Known to not be a fork.
    Root,
    /// Not yet determined.
    Unknown,
}

/// The lifecycle status of a [`Repository`] record.
///
/// See the state machine in the repository state machine component for the
/// legal transitions between these statuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Waiting to be picked up by a worker.
    Pending,
    /// Currently being processed by a worker.
    Fetching,
    /// Last job completed successfully.
    Fetched,
    /// The repository could not be found at any configured endpoint.
    NotFound,
    /// The repository requires authentication this worker does not have.
    AuthRequired,
    /// Reserved for external retry-budget policies; never a transition
    /// target reached by the core job itself.
    Error,
}

/// A single git reference discovered in a repository, annotated with the
/// root(s) of history it descends from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// The original ref name, e.g. `refs/heads/main`.
    pub name: Vec<u8>,
    /// What this reference points at.
    pub target: RefTarget,
    /// Every root commit reachable from this reference.
    pub roots: Vec<RootHash>,
    /// Committer time of the pointed-to commit, seconds since epoch.
    pub committed_at: i64,
}

/// What a [`Reference`] ultimately resolves to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefTarget {
    /// A direct pointer at an object hash.
    Direct(ObjectId),
    /// A symbolic pointer at another ref by name.
    Symbolic(Vec<u8>),
}

/// A repository record as persisted by the external store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Repository {
    /// Stable identifier.
    pub id: RepositoryId,
    /// Ordered candidate endpoints; the first is canonical.
    pub endpoints: Vec<String>,
    /// Whether this repository is believed to be a fork of another.
    pub is_fork: ForkStatus,
    /// Current lifecycle status.
    pub status: Status,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp of the last successful fetch, if any.
    pub fetched_at: Option<i64>,
    /// Maximum committer time across all references, if any.
    pub last_commit_at: Option<i64>,
    /// The reference list as of the last successful job.
    pub references: Vec<Reference>,
    /// Optimistic-concurrency version. Bumped on every persisted mutation.
    pub version: u64,
}

/// A unit of work: archive one repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// The repository to process.
    pub repository_id: RepositoryId,
}

//================================================================================================
// Impls
//================================================================================================

impl RepositoryId {
    /// Construct an id from its raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// The raw bytes of this id.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl RootHash {
    /// Wrap an [`ObjectId`] as a root hash.
    pub fn new(id: ObjectId) -> Self {
        Self(id)
    }

    /// The underlying object id.
    pub fn id(&self) -> &ObjectId {
        &self.0
    }

    /// Lowercase hex encoding of this hash.
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl fmt::Display for RootHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Reference {
    /// The canonical root for this reference: the lexicographically smallest
    /// hash among [`Reference::roots`].
    ///
    /// # Panics
    /// Panics if `roots` is empty; every constructed `Reference` must carry
    /// at least one root (see the referencer component).
    pub fn init(&self) -> RootHash {
        *self
            .roots
            .iter()
            .min()
            .expect("a Reference always carries at least one root")
    }

    /// Rewrite this reference's name into its namespaced in-archive form:
    /// `refs/<rest>/<repository-id>`.
    pub fn namespaced_name(&self, repo: RepositoryId) -> Vec<u8> {
        let mut name = self.name.clone();
        name.push(b'/');
        name.extend_from_slice(repo.to_string().as_bytes());
        name
    }
}

/// Strip the trailing `/<repository-id>` segment a namespaced ref name
/// carries inside a rooted archive, returning the original name.
pub fn strip_namespace(namespaced: &[u8]) -> Option<&[u8]> {
    let pos = namespaced.iter().rposition(|&b| b == b'/')?;
    Some(&namespaced[..pos])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn namespacing_round_trips() {
        let repo = RepositoryId::from_bytes([7; 16]);
        let reference = Reference {
            name: b"refs/heads/master".to_vec(),
            target: RefTarget::Direct(ObjectId::null(gix::hash::Kind::Sha1)),
            roots: vec![RootHash::new(ObjectId::null(gix::hash::Kind::Sha1))],
            committed_at: 0,
        };
        let namespaced = reference.namespaced_name(repo);
        assert_eq!(strip_namespace(&namespaced), Some(reference.name.as_slice()));
    }

    #[test]
    fn init_picks_smallest_root() {
        let small = ObjectId::from_hex(b"0000000000000000000000000000000000000000").unwrap();
        let large = ObjectId::from_hex(b"ffffffffffffffffffffffffffffffffffffffff").unwrap();
        let reference = Reference {
            name: b"refs/heads/dev".to_vec(),
            target: RefTarget::Direct(large),
            roots: vec![RootHash::new(large), RootHash::new(small)],
            committed_at: 0,
        };
        assert_eq!(reference.init().id(), &small);
    }
}
