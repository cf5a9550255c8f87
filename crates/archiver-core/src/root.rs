//! # Root-Commit Resolver
//!
//! Computes the set of root commits (commits with no parents) reachable from
//! a starting commit, iteratively and with memoisation so that shared
//! sub-histories are only walked once per call site.
//!
//! The algorithm is an explicit-stack port of a recursive "collect roots of
//! every parent, then union them" walk: recursion is replaced with a stack of
//! [`Frame`]s so arbitrarily deep histories don't blow the call stack.

use std::collections::HashMap;

use gix::{Commit, ObjectId, Repository};

use crate::error::RootError;
use crate::model::RootHash;

//================================================================================================
// Types
//================================================================================================

/// Memoises root sets already computed for a commit hash, shared across
/// multiple calls to [`roots_of`] within the same repository scan.
pub type Seen = HashMap<ObjectId, Vec<RootHash>>;

/// One level of the explicit-stack walk: the parent hashes of a commit
/// currently being expanded, and how far into them we've progressed.
struct Frame {
    hashes: Vec<ObjectId>,
    cursor: usize,
    acc: Vec<RootHash>,
}

//================================================================================================
// Functions
//================================================================================================

/// Resolve the root commits reachable from `start`, peeling tags first.
///
/// `seen` is threaded across calls so that a commit visited once, anywhere in
/// the scan, is never walked twice.
pub fn roots_of(
    repo: &Repository,
    start: ObjectId,
    seen: &mut Seen,
) -> Result<Vec<RootHash>, RootError> {
    let start = peel_to_commit(repo, start)?;
    if let Some(cached) = seen.get(&start) {
        return Ok(cached.clone());
    }

    let mut stack = vec![Frame {
        hashes: vec![start],
        cursor: 0,
        acc: Vec::new(),
    }];

    loop {
        let top_is_root_frame = stack.len() == 1;
        let frame = stack.last_mut().expect("stack never empties before returning");

        if frame.cursor == frame.hashes.len() {
            let mut acc = std::mem::take(&mut frame.acc);
            dedup_roots(&mut acc);
            stack.pop();
            if top_is_root_frame {
                seen.insert(start, acc.clone());
                return Ok(acc);
            }
            let parent = stack.last_mut().expect("non-root frame implies a parent frame exists");
            let just_expanded = parent.hashes[parent.cursor - 1];
            seen.insert(just_expanded, acc.clone());
            parent.acc.extend(acc);
            continue;
        }

        let h = frame.hashes[frame.cursor];
        frame.cursor += 1;

        if let Some(cached) = seen.get(&h) {
            let frame = stack.last_mut().unwrap();
            frame.acc.extend(cached.clone());
            continue;
        }

        let commit = repo
            .find_commit(h)
            .map_err(|e| RootError::Find(Box::new(e)))?;
        let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.detach()).collect();

        if parents.is_empty() {
            let frame = stack.last_mut().unwrap();
            frame.acc.push(RootHash::new(h));
            seen.insert(h, vec![RootHash::new(h)]);
        } else {
            stack.push(Frame {
                hashes: parents,
                cursor: 0,
                acc: Vec::new(),
            });
        }
    }
}

/// Sort and deduplicate an accumulated root list so the result is
/// independent of traversal order — two octopus-merge parents sharing a
/// root must not produce that root twice.
fn dedup_roots(roots: &mut Vec<RootHash>) {
    roots.sort_unstable();
    roots.dedup();
}

/// Peel tags down to the commit they ultimately reference. Any object that
/// is neither a tag nor a commit yields [`RootError::UnsupportedObjectType`].
fn peel_to_commit(repo: &Repository, mut id: ObjectId) -> Result<ObjectId, RootError> {
    loop {
        let object = repo
            .find_object(id)
            .map_err(|e| RootError::Find(Box::new(e)))?;
        match object.kind {
            gix::object::Kind::Commit => return Ok(id),
            gix::object::Kind::Tag => {
                let tag = object
                    .try_into_tag()
                    .expect("kind checked to be Tag above");
                id = tag.target_id().map_err(|e| RootError::Find(Box::new(e)))?.detach();
            },
            _ => return Err(RootError::UnsupportedObjectType),
        }
    }
}

/// Peel and resolve a commit's roots in one step; a thin convenience wrapper
/// used by the referencer when it already has a [`Commit`] rather than a raw
/// hash.
pub fn roots_of_commit(
    repo: &Repository,
    commit: &Commit<'_>,
    seen: &mut Seen,
) -> Result<Vec<RootHash>, RootError> {
    roots_of(repo, commit.id, seen)
}

#[cfg(test)]
mod test {
    use gix::objs::Commit as CommitObj;
    use gix::actor::Signature;
    use gix::date::Time;

    use super::*;

    fn sig() -> Signature {
        Signature {
            name: "test".into(),
            email: "test@example.com".into(),
            time: Time::new(0, 0),
        }
    }

    fn write_commit(repo: &Repository, parents: Vec<ObjectId>, message: &str) -> ObjectId {
        let empty_tree = repo.empty_tree().id;
        let commit = CommitObj {
            tree: empty_tree.detach(),
            parents: parents.into(),
            author: sig(),
            committer: sig(),
            encoding: None,
            message: message.into(),
            extra_headers: vec![],
        };
        repo.write_object(commit).unwrap().detach()
    }

    #[test]
    fn single_root_linear_history() {
        let dir = tempfile::tempdir().unwrap();
        let repo = gix::init(dir.path()).unwrap();
        let root = write_commit(&repo, vec![], "root");
        let tip = write_commit(&repo, vec![root], "tip");

        let mut seen = Seen::new();
        let roots = roots_of(&repo, tip, &mut seen).unwrap();
        assert_eq!(roots, vec![RootHash::new(root)]);
    }

    #[test]
    fn merge_commit_unions_both_roots() {
        let dir = tempfile::tempdir().unwrap();
        let repo = gix::init(dir.path()).unwrap();
        let root_a = write_commit(&repo, vec![], "root a");
        let root_b = write_commit(&repo, vec![], "root b");
        let merge = write_commit(&repo, vec![root_a, root_b], "merge");

        let mut seen = Seen::new();
        let mut roots = roots_of(&repo, merge, &mut seen).unwrap();
        roots.sort();
        let mut expected = vec![RootHash::new(root_a), RootHash::new(root_b)];
        expected.sort();
        assert_eq!(roots, expected);
    }

    #[test]
    fn diamond_merge_deduplicates_shared_root() {
        let dir = tempfile::tempdir().unwrap();
        let repo = gix::init(dir.path()).unwrap();
        let root = write_commit(&repo, vec![], "root");
        let left = write_commit(&repo, vec![root], "left");
        let right = write_commit(&repo, vec![root], "right");
        let merge = write_commit(&repo, vec![left, right], "merge");

        let mut seen = Seen::new();
        let roots = roots_of(&repo, merge, &mut seen).unwrap();
        assert_eq!(roots, vec![RootHash::new(root)]);
    }

    #[test]
    fn seen_cache_is_keyed_by_commit_not_last_parent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = gix::init(dir.path()).unwrap();
        let root_a = write_commit(&repo, vec![], "root a");
        let root_b = write_commit(&repo, vec![], "root b");
        let merge = write_commit(&repo, vec![root_a, root_b], "merge");

        let mut seen = Seen::new();
        roots_of(&repo, merge, &mut seen).unwrap();

        let roots_b = roots_of(&repo, root_b, &mut seen).unwrap();
        assert_eq!(roots_b, vec![RootHash::new(root_b)]);
    }

    #[test]
    fn memoisation_is_reused_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let repo = gix::init(dir.path()).unwrap();
        let root = write_commit(&repo, vec![], "root");
        let tip = write_commit(&repo, vec![root], "tip");

        let mut seen = Seen::new();
        let first = roots_of(&repo, tip, &mut seen).unwrap();
        let second = roots_of(&repo, tip, &mut seen).unwrap();
        assert_eq!(first, second);
        assert!(seen.contains_key(&tip));
    }
}
