//! # Change Applier
//!
//! Applies a single root's [`RootDiff`] inside one archive transaction:
//! records the owning repository's remote metadata, removes deleted refs,
//! and pushes new/updated objects and refs in from the scratch mirror.
//!
//! `gix` does not yet implement push, so — exactly as this codebase's own
//! publishing path does — the actual object transfer shells out to the `git`
//! binary, one task per ref, joined concurrently.

use std::path::Path;

use gix::refs::transaction::PreviousValue;
use tokio::task::JoinSet;

use crate::differ::{self, RootDiff};
use crate::error::ApplierError;
use crate::model::{ForkStatus, RepositoryId};
use crate::referencer::remote_tracking_to_logical;
use crate::store::Transaction;

//================================================================================================
// Functions
//================================================================================================

/// Apply `diff` to the archive transaction `tx`, pushing objects from the
/// scratch clone at `scratch_path`. On any failure the caller should roll
/// `tx` back rather than commit it.
pub async fn apply(
    tx: &dyn Transaction,
    scratch_path: &Path,
    repo: RepositoryId,
    endpoints: &[String],
    is_fork: ForkStatus,
    diff: &RootDiff,
) -> Result<(), ApplierError> {
    ensure_remote_config(tx.repo(), repo, endpoints, is_fork)?;

    for deleted in &diff.dels {
        let namespaced = deleted.namespaced_name(repo);
        if let Ok(reference) = tx.repo().find_reference(
            gix::bstr::BStr::new(namespaced.as_slice()),
        ) {
            let _ = reference.delete();
        }
    }

    let remote = repo.to_string();
    let mut refspecs = Vec::new();
    for added in diff.adds.iter().chain(diff.mods.iter()) {
        let remote_name = String::from_utf8_lossy(&added.name).into_owned();
        let local_namespaced = String::from_utf8_lossy(&added.namespaced_name(repo)).into_owned();
        refspecs.push(format!(
            "refs/remotes/{remote}/{}:{}",
            remote_name.trim_start_matches("refs/"),
            local_namespaced
        ));
    }
    for (name, target) in &diff.symbolic {
        if let Some((namespaced_name, namespaced_target)) =
            differ::namespace_symbolic(repo, name, target)
        {
            write_symbolic(tx.repo(), &namespaced_name, &namespaced_target)?;
        }
    }

    if refspecs.is_empty() {
        return Ok(());
    }

    push_refs(scratch_path, tx.repo().git_dir(), &refspecs).await
}

/// The bulk-import fast path used when both the scratch clone and the target
/// archive are brand new: copy every ref across without computing a diff.
pub async fn bulk_import(
    tx: &dyn Transaction,
    scratch_path: &Path,
    scratch_repo: &gix::Repository,
    repo: RepositoryId,
    endpoints: &[String],
    is_fork: ForkStatus,
) -> Result<(), ApplierError> {
    ensure_remote_config(tx.repo(), repo, endpoints, is_fork)?;

    let remote = repo.to_string();
    let mut refspecs = Vec::new();
    let platform = scratch_repo.references().map_err(|e| ApplierError::Io(io_other(e)))?;
    for candidate in platform.all().map_err(|e| ApplierError::Io(io_other(e)))? {
        let Ok(reference) = candidate else { continue };
        let raw_name = reference.name().as_bstr().to_string();
        let Some(name) = remote_tracking_to_logical(raw_name.as_bytes(), &remote) else {
            continue;
        };
        let name = String::from_utf8_lossy(&name).into_owned();
        let local = format!("{name}/{repo}");
        refspecs.push(format!("{raw_name}:{local}"));
    }

    if refspecs.is_empty() {
        return Ok(());
    }

    push_refs(scratch_path, tx.repo().git_dir(), &refspecs).await
}

fn ensure_remote_config(
    repo: &gix::Repository,
    repository_id: RepositoryId,
    endpoints: &[String],
    is_fork: ForkStatus,
) -> Result<(), ApplierError> {
    let section = repository_id.to_string();
    let mut config = repo.config_snapshot().clone();
    let current_url = config
        .string(format!("remote.{section}.url").as_str())
        .map(|v| v.to_string());

    if current_url.as_deref() != endpoints.first().map(String::as_str) {
        let mut file = gix::config::File::from_path_no_includes(
            repo.git_dir().join("config"),
            gix::config::Source::Local,
        )
        .unwrap_or_else(|_| gix::config::File::new(gix::config::file::Metadata::from(
            gix::config::Source::Local,
        )));
        if let Some(url) = endpoints.first() {
            let _ = file.set_raw_value(&format!("remote.{section}", ), "url", url.as_str());
        }
        let is_fork_str = matches!(is_fork, ForkStatus::Fork).to_string();
        let _ = file.set_raw_value(&format!("remote.{section}"), "isfork", is_fork_str.as_str());
        let _ = std::fs::write(repo.git_dir().join("config"), file.to_bstring());
    }

    Ok(())
}

fn write_symbolic(
    repo: &gix::Repository,
    name: &[u8],
    target: &[u8],
) -> Result<(), ApplierError> {
    let full_name =
        gix::refs::FullName::try_from(gix::bstr::BStr::new(name).to_owned()).map_err(|_| {
            ApplierError::Io(std::io::Error::other("invalid symbolic ref name"))
        })?;
    let target_name =
        gix::refs::FullName::try_from(gix::bstr::BStr::new(target).to_owned()).map_err(|_| {
            ApplierError::Io(std::io::Error::other("invalid symbolic ref target"))
        })?;

    repo.edit_reference(gix::refs::transaction::RefEdit {
        change: gix::refs::transaction::Change::Update {
            log: Default::default(),
            expected: PreviousValue::Any,
            new: gix::refs::Target::Symbolic(target_name),
        },
        name: full_name,
        deref: false,
    })
    .map_err(|e| ApplierError::RefUpdate(Box::new(e)))?;

    Ok(())
}

/// Push `refspecs` from the scratch clone at `scratch_git_dir` into the
/// archive at `archive_git_dir`, one `git push` subprocess per ref, run
/// concurrently and joined at the end.
async fn push_refs(
    scratch_path: &Path,
    archive_git_dir: &Path,
    refspecs: &[String],
) -> Result<(), ApplierError> {
    let mut tasks = JoinSet::new();
    let archive_path = archive_git_dir.to_string_lossy().into_owned();
    let scratch = scratch_path.to_string_lossy().into_owned();

    for refspec in refspecs.iter().cloned() {
        let archive_path = archive_path.clone();
        let scratch = scratch.clone();
        tasks.spawn(async move { run_git_push(&scratch, &archive_path, &refspec) });
    }

    let mut failed = 0usize;
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => {},
            Ok(Err(_)) => failed += 1,
            Err(join_err) => return Err(ApplierError::JoinFailed(join_err)),
        }
    }

    if failed > 0 {
        Err(ApplierError::PushFailed(failed))
    } else {
        Ok(())
    }
}

/// Shells out to `git push`, the same pragmatic escape hatch used elsewhere
/// in this codebase for operations `gix` does not yet implement.
fn run_git_push(scratch_git_dir: &str, target: &str, refspec: &str) -> std::io::Result<()> {
    use std::process::Command;

    let output = Command::new("git")
        .args(["-C", scratch_git_dir, "push", target, refspec])
        .output()?;

    if output.status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(String::from_utf8_lossy(&output.stderr).into_owned()))
    }
}

fn io_other(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn run_git_push_surfaces_subprocess_errors() {
        let result = run_git_push("/nonexistent", "/nonexistent", "refs/heads/x:refs/heads/x");
        assert!(result.is_err());
    }
}
