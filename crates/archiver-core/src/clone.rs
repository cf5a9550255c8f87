//! # Temporary Cloner
//!
//! Mirrors a remote repository into a scratch directory so the referencer and
//! applier can work against a local, read-write object store. Classifies
//! fetch failures into the few outcomes the state machine cares about:
//! not-found, auth-required, or a generic transient failure.

use std::path::{Path, PathBuf};

use gix::remote::Direction;
use gix::Repository;

use crate::error::CloneError;

//================================================================================================
// Types
//================================================================================================

/// A scratch mirror produced by [`clone`]. Unconditionally removed from disk
/// on `Drop`, so every early return from the job executor — success or
/// error — leaves no orphaned directory behind.
pub struct ScratchClone {
    path: PathBuf,
    repo: Repository,
}

//================================================================================================
// Functions
//================================================================================================

/// Clone `endpoint` into a fresh scratch directory under `scratch_root`,
/// named `<repository_id>_<disambiguator>` so concurrent workers never
/// collide on the same path.
pub fn clone(
    scratch_root: &Path,
    repository_id: &str,
    disambiguator: u64,
    endpoint: &str,
) -> Result<ScratchClone, CloneError> {
    let dir = scratch_root.join(format!("{repository_id}_{disambiguator}"));
    std::fs::create_dir_all(&dir)?;

    let repo = gix::init(&dir).map_err(Box::new)?;

    let refs_spec = format!("+refs/*:refs/remotes/{repository_id}/*");
    let head_spec = format!("+HEAD:refs/remotes/{repository_id}/HEAD");
    let remote = repo
        .remote_at(endpoint)
        .and_then(|r| {
            r.with_refspecs([refs_spec.as_str()], Direction::Fetch)
                .and_then(|r| r.with_refspecs([head_spec.as_str()], Direction::Fetch))
        })
        .map_err(|e| classify_transient(&e.to_string()))?;

    match fetch(&remote) {
        Ok(FetchOutcome::Updated) | Ok(FetchOutcome::UpToDate) => Ok(ScratchClone { path: dir, repo }),
        Err(e) => {
            let _ = std::fs::remove_dir_all(&dir);
            Err(e)
        },
    }
}

enum FetchOutcome {
    Updated,
    UpToDate,
}

fn fetch(remote: &gix::Remote<'_>) -> Result<FetchOutcome, CloneError> {
    use gix::progress::Discard;
    use gix::remote::fetch::Tags;

    let remote = remote.clone().with_fetch_tags(Tags::None);
    let connection = remote
        .connect(Direction::Fetch)
        .map_err(|e| classify_transient(&e.to_string()))?;

    let outcome = connection
        .prepare_fetch(Discard, Default::default())
        .map_err(|e| classify_transient(&e.to_string()))?
        .receive(Discard, &Default::default())
        .map_err(|e| classify_transient(&e.to_string()))?;

    use gix::remote::fetch::Status;
    match outcome.status {
        Status::NoPackReceived { .. } => Ok(FetchOutcome::UpToDate),
        Status::Change { .. } => Ok(FetchOutcome::Updated),
        Status::DryRun { .. } => Ok(FetchOutcome::UpToDate),
    }
}

/// Heuristically classify a transport-layer error message into one of the
/// three outcomes the state machine distinguishes. `gix`'s error types do not
/// currently expose a stable enum for "repository not found" vs. "auth
/// required" across every transport, so this inspects the rendered message —
/// the same pragmatic approach the underlying git CLI's callers take.
fn classify_transient(message: &str) -> CloneError {
    let lower = message.to_lowercase();
    if lower.contains("not found") || lower.contains("404") || lower.contains("repository not exist")
    {
        CloneError::NotFound
    } else if lower.contains("authentication")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("permission denied")
    {
        CloneError::AuthRequired
    } else {
        CloneError::Transient(message.to_owned())
    }
}

impl ScratchClone {
    /// The opened scratch repository.
    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// The path on disk backing this clone.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the clone ended up with zero refs (empty remote, or the
    /// "already up to date" case against an empty store).
    pub fn is_empty(&self) -> bool {
        self.repo
            .references()
            .and_then(|p| p.all().map(|mut i| i.next().is_none()))
            .unwrap_or(true)
    }
}

impl Drop for ScratchClone {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_not_found() {
        assert!(matches!(
            classify_transient("remote: Repository not found"),
            CloneError::NotFound
        ));
    }

    #[test]
    fn classifies_auth_required() {
        assert!(matches!(
            classify_transient("fatal: Authentication failed for 'https://example.com/x'"),
            CloneError::AuthRequired
        ));
    }

    #[test]
    fn falls_back_to_transient() {
        assert!(matches!(
            classify_transient("connection reset by peer"),
            CloneError::Transient(_)
        ));
    }

    #[test]
    fn clone_into_scratch_dir_is_removed_on_drop() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("myrepo_1");
        std::fs::create_dir_all(&dir).unwrap();
        let repo = gix::init(&dir).unwrap();
        let clone = ScratchClone { path: dir.clone(), repo };
        drop(clone);
        assert!(!dir.exists());
    }
}
