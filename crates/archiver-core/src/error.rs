//! # Archiver Errors
//!
//! Layered error types for each pipeline component, composed into the top-level
//! [`Error`] the job executor surfaces.

use thiserror::Error;

use crate::model::RepositoryId;

/// Errors produced by the root-commit resolver.
#[derive(Error, Debug)]
pub enum RootError {
    /// The starting object was neither a commit nor a tag.
    #[error("referenced object is not a commit or tag")]
    UnsupportedObjectType,
    /// Failed to decode a commit or tag object while walking history.
    #[error(transparent)]
    Decode(#[from] Box<gix::objs::decode::Error>),
    /// Failed to look up an object by id.
    #[error(transparent)]
    Find(#[from] Box<gix::object::find::existing::Error>),
}

/// Errors produced by the temporary cloner.
#[derive(Error, Debug)]
pub enum CloneError {
    /// None of the configured endpoints resolved to a repository.
    #[error("repository not found at any configured endpoint")]
    NotFound,
    /// The remote requires credentials this worker does not have.
    #[error("authentication required")]
    AuthRequired,
    /// A transient network or protocol failure occurred; the caller may retry.
    #[error("fetch failed: {0}")]
    Transient(String),
    /// Failed to initialize the scratch repository on disk.
    #[error(transparent)]
    Init(#[from] Box<gix::init::Error>),
    /// An I/O error occurred while preparing the scratch directory.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors produced while enumerating and resolving references.
#[derive(Error, Debug)]
pub enum ReferencerError {
    /// Resolving the roots of a reference failed.
    #[error(transparent)]
    Root(#[from] RootError),
    /// Failed to start iterating the repository's references at all, e.g. a
    /// corrupt `packed-refs` file.
    #[error(transparent)]
    Discover(#[from] Box<gix::reference::iter::Error>),
}

/// Errors produced by the rooted-archive store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store root is stamped with a bucket depth that does not match the
    /// configured one.
    #[error("store bucket depth mismatch: configured {configured}, on-disk {on_disk}")]
    BucketDepthMismatch {
        /// The depth this process is configured with.
        configured: u8,
        /// The depth recorded on disk.
        on_disk: u8,
    },
    /// The archive could not be decoded, or went missing between `begin` and use.
    #[error("rooted archive is missing or corrupt")]
    ArchiveCorrupt,
    /// An I/O error occurred manipulating the transaction or published file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Failed to open or initialize the underlying git object store.
    #[error(transparent)]
    Open(#[from] Box<gix::open::Error>),
    /// Failed to initialize a fresh archive.
    #[error(transparent)]
    Init(#[from] Box<gix::init::Error>),
}

/// Errors produced while applying a set of reference changes to a rooted
/// archive.
#[derive(Error, Debug)]
pub enum ApplierError {
    /// The rooted-archive store returned an error.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Failed to update a reference inside the archive.
    #[error(transparent)]
    RefUpdate(#[from] Box<gix::reference::edit::Error>),
    /// Failed to write the remote configuration section for a repository.
    #[error(transparent)]
    Config(#[from] Box<gix::config::file::set_raw_value::Error>),
    /// Shelling out to `git push` failed for at least one reference.
    #[error("failed to push {0} reference(s) into the rooted archive")]
    PushFailed(usize),
    /// A spawned push task failed to join.
    #[error(transparent)]
    JoinFailed(#[from] tokio::task::JoinError),
    /// An I/O error occurred copying objects from the scratch mirror.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors produced by the distributed lock.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock could not be acquired before its lease timeout elapsed.
    #[error("timed out acquiring lock for key {0}")]
    Timeout(String),
    /// The backend reported an unrecoverable failure.
    #[error("lock backend failure: {0}")]
    Backend(String),
}

/// Errors produced transitioning a repository's status.
#[derive(Error, Debug)]
pub enum StateError {
    /// A job for this repository is already in flight.
    #[error("repository {0} is already fetching")]
    AlreadyFetching(RepositoryId),
    /// The optimistic-concurrency version did not match at write time.
    #[error("repository {0} was concurrently modified")]
    VersionConflict(RepositoryId),
    /// The persistence backend reported a failure.
    #[error("persistence backend failure: {0}")]
    Backend(String),
}

/// The top-level error surfaced by the job executor.
#[derive(Error, Debug)]
pub enum Error {
    /// See [`StateError::AlreadyFetching`]; fails the job fast without
    /// mutating the repository record.
    #[error(transparent)]
    AlreadyFetching(#[from] StateError),
    /// See [`CloneError`].
    #[error(transparent)]
    Clone(#[from] CloneError),
    /// See [`ReferencerError`].
    #[error(transparent)]
    Referencer(#[from] ReferencerError),
    /// See [`ApplierError`].
    #[error(transparent)]
    Applier(#[from] ApplierError),
    /// See [`LockError`].
    #[error(transparent)]
    Lock(#[from] LockError),
    /// The job's overall deadline elapsed before it could complete.
    #[error("job deadline exceeded")]
    DeadlineExceeded,
    /// Any other unexpected failure, always logged with full detail.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error should reset the repository to `pending` for a
    /// later retry, as opposed to a terminal status.
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            Error::Clone(CloneError::NotFound) | Error::Clone(CloneError::AuthRequired)
        )
    }

    /// Log this error with the structured fields an operator needs to
    /// correlate it with a repository and job, at a severity appropriate to
    /// whether it is expected (e.g. `AlreadyFetching`) or not.
    pub fn warn(&self, repository_id: RepositoryId) {
        match self {
            Error::AlreadyFetching(_) => {
                tracing::debug!(repository.id = %repository_id, message = %self);
            },
            _ => {
                tracing::warn!(repository.id = %repository_id, message = %self);
            },
        }
    }
}
