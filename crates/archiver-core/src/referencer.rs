//! # Referencer
//!
//! Enumerates every commit-pointing reference in a repository and annotates
//! each with the root commits it descends from, sharing a single memoisation
//! map across the whole scan.

use gix::refs::Target;
use gix::{ObjectId, Repository};

use crate::error::ReferencerError;
use crate::model::{RefTarget, Reference};
use crate::root::{self, Seen};

//================================================================================================
// Functions
//================================================================================================

/// Enumerate the refs of `repo`'s `remote` namespace and resolve the roots of
/// every hash ref. The scratch clone this runs against was fetched with
/// every upstream ref rewritten under `refs/remotes/<remote>/*` (see
/// [`crate::clone`]), so this strips that namespace back to the logical
/// `refs/<rest>` name the archive stores refs under; anything outside the
/// namespace (there shouldn't be any, in a scratch clone) is skipped.
/// Symbolic refs are returned unresolved, separately, since they carry no
/// roots of their own until rewritten against their target (see the differ
/// component).
pub fn enumerate(
    repo: &Repository,
    remote: &str,
) -> Result<(Vec<Reference>, Vec<(Vec<u8>, Vec<u8>)>), ReferencerError> {
    let mut seen = Seen::new();
    let mut resolved = Vec::new();
    let mut symbolic = Vec::new();

    let platform = repo.references().map_err(|e| ReferencerError::Discover(Box::new(e)))?;

    for candidate in platform.all().map_err(|e| ReferencerError::Discover(Box::new(e)))? {
        let reference = match candidate {
            Ok(r) => r,
            Err(_) => continue,
        };
        let raw_name = reference.name().as_bstr().to_vec();
        let Some(name) = remote_tracking_to_logical(&raw_name, remote) else {
            continue;
        };

        match reference.target() {
            Target::Symbolic(target_name) => {
                let target = remote_tracking_to_logical(&target_name.as_bstr().to_vec(), remote)
                    .unwrap_or_else(|| target_name.as_bstr().to_vec());
                symbolic.push((name, target));
            },
            Target::Object(id) => {
                if let Some(resolved_ref) = resolve_one(repo, name.clone(), id.into(), &mut seen)? {
                    resolved.push(resolved_ref);
                }
            },
        }
    }

    Ok((resolved, symbolic))
}

fn resolve_one(
    repo: &Repository,
    name: Vec<u8>,
    target: ObjectId,
    seen: &mut Seen,
) -> Result<Option<Reference>, ReferencerError> {
    use crate::error::RootError;

    let committed_at = repo
        .find_object(target)
        .ok()
        .and_then(|obj| obj.try_into_commit().ok())
        .and_then(|c| c.committer().ok().map(|sig| sig.time.seconds))
        .unwrap_or(0);

    match root::roots_of(repo, target, seen) {
        Ok(roots) => Ok(Some(Reference {
            name,
            target: RefTarget::Direct(target),
            roots,
            committed_at,
        })),
        Err(RootError::UnsupportedObjectType) => Ok(None),
        Err(e) => Err(ReferencerError::Root(e)),
    }
}

/// Translate a remote-tracking ref name such as `refs/remotes/<remote>/heads/main`
/// back to its logical archive form `refs/heads/main`. Returns `None` for the
/// bare `refs/remotes/<remote>/HEAD` entry (it carries no `refs/` rest) and
/// for anything outside `<remote>`'s namespace.
pub(crate) fn remote_tracking_to_logical(name: &[u8], remote: &str) -> Option<Vec<u8>> {
    let prefix = format!("refs/remotes/{remote}/");
    let rest = name.strip_prefix(prefix.as_bytes())?;
    if rest == b"HEAD" {
        return None;
    }
    Some([b"refs/", rest].concat())
}

#[cfg(test)]
mod test {
    use gix::actor::Signature;
    use gix::date::Time;
    use gix::objs::Commit as CommitObj;
    use gix::refs::transaction::PreviousValue;

    use super::*;

    fn sig() -> Signature {
        Signature {
            name: "test".into(),
            email: "test@example.com".into(),
            time: Time::new(0, 0),
        }
    }

    #[test]
    fn translates_remote_tracking_refs_to_logical_names() {
        let dir = tempfile::tempdir().unwrap();
        let repo = gix::init(dir.path()).unwrap();
        let empty_tree = repo.empty_tree().id;
        let commit = CommitObj {
            tree: empty_tree.detach(),
            parents: vec![].into(),
            author: sig(),
            committer: sig(),
            encoding: None,
            message: "root".into(),
            extra_headers: vec![],
        };
        let id = repo.write_object(commit).unwrap().detach();
        repo.reference(
            "refs/remotes/123/heads/main",
            id,
            PreviousValue::Any,
            "test: remote-tracking",
        )
        .unwrap();
        repo.reference(
            "refs/remotes/123/HEAD",
            id,
            PreviousValue::Any,
            "test: remote head",
        )
        .unwrap();

        let (resolved, _) = enumerate(&repo, "123").unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, b"refs/heads/main");
    }

    #[test]
    fn skips_refs_outside_the_remote_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let repo = gix::init(dir.path()).unwrap();
        let empty_tree = repo.empty_tree().id;
        let commit = CommitObj {
            tree: empty_tree.detach(),
            parents: vec![].into(),
            author: sig(),
            committer: sig(),
            encoding: None,
            message: "root".into(),
            extra_headers: vec![],
        };
        let id = repo.write_object(commit).unwrap().detach();
        repo.reference(
            "refs/remotes/other/heads/main",
            id,
            PreviousValue::Any,
            "test: foreign remote",
        )
        .unwrap();

        let (resolved, _) = enumerate(&repo, "123").unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn remote_tracking_to_logical_strips_namespace() {
        assert_eq!(
            remote_tracking_to_logical(b"refs/remotes/123/heads/main", "123"),
            Some(b"refs/heads/main".to_vec())
        );
        assert_eq!(remote_tracking_to_logical(b"refs/remotes/123/HEAD", "123"), None);
        assert_eq!(remote_tracking_to_logical(b"refs/heads/main", "123"), None);
    }
}
