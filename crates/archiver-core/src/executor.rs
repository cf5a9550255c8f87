//! # Job Executor
//!
//! Orchestrates one archiver job end-to-end: acquire the repository lock,
//! clone, enumerate references, diff against the persisted state, apply the
//! changes to every affected rooted archive under its own lock, persist the
//! new reference list, and transition the repository to a terminal status.
//! The scratch clone is removed unconditionally on every exit path.

use std::time::Duration;

use tracing::Instrument;

use crate::clone;
use crate::differ;
use crate::error::{ApplierError, CloneError, Error, StateError};
use crate::model::{Job, Reference, RepositoryId, Status};
use crate::persistence::Persistence;
use crate::referencer;
use crate::lock::LockSession;
use crate::state;
use crate::store::RootedArchiveStore;
use crate::{applier, lock};

//================================================================================================
// Types
//================================================================================================

/// Configuration the executor needs beyond what's in [`config::Config`].
pub struct ExecutorSettings {
    /// Root directory for scratch clones.
    pub scratch_root: std::path::PathBuf,
    /// Lease timeout for lock acquisition.
    pub lock_timeout: Duration,
    /// Overall deadline for a single job.
    pub job_deadline: Duration,
}

/// Wires the collaborators a job needs: persistence, lock session, and
/// rooted-archive store.
pub struct Executor<'a> {
    persistence: &'a dyn Persistence,
    locks: &'a dyn LockSession,
    store: &'a dyn RootedArchiveStore,
    settings: ExecutorSettings,
}

//================================================================================================
// Impls
//================================================================================================

impl<'a> Executor<'a> {
    /// Construct an executor over the given collaborators.
    pub fn new(
        persistence: &'a dyn Persistence,
        locks: &'a dyn LockSession,
        store: &'a dyn RootedArchiveStore,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            persistence,
            locks,
            store,
            settings,
        }
    }

    /// Run `job` to completion, applying the job deadline across the whole
    /// pipeline.
    pub async fn run(&self, job: Job) -> Result<(), Error> {
        let span = tracing::info_span!("archive", repository.id = %job.repository_id);
        tokio::time::timeout(self.settings.job_deadline, self.run_inner(job))
            .instrument(span)
            .await
            .unwrap_or(Err(Error::DeadlineExceeded))
    }

    async fn run_inner(&self, job: Job) -> Result<(), Error> {
        let repository_id = job.repository_id;

        let repo_key = format!("repo/{repository_id}");
        let repo_lease = self
            .locks
            .lock(&repo_key, self.settings.lock_timeout)
            .await?;

        let result = self.run_locked(repository_id).await;
        repo_lease.unlock().await;
        result
    }

    async fn run_locked(&self, repository_id: RepositoryId) -> Result<(), Error> {
        let repo = match state::begin(self.persistence, repository_id).await {
            Ok(repo) => repo,
            Err(e @ StateError::AlreadyFetching(_)) => return Err(Error::AlreadyFetching(e)),
            Err(e) => return Err(Error::Internal(e.to_string())),
        };

        match self.try_archive(&repo).await {
            Ok((references, last_commit_at)) => {
                let fetched_at = now_seconds();
                state::finish_success(
                    self.persistence,
                    repository_id,
                    repo.version,
                    references,
                    fetched_at,
                    last_commit_at,
                )
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
                Ok(())
            },
            Err(e) => {
                let terminal = match &e {
                    Error::Clone(CloneError::NotFound) => Some(Status::NotFound),
                    Error::Clone(CloneError::AuthRequired) => Some(Status::AuthRequired),
                    _ => None,
                };
                e.warn(repository_id);
                state::finish_with_error(self.persistence, repository_id, repo.version, terminal)
                    .await
                    .map_err(|se| Error::Internal(se.to_string()))?;
                Err(e)
            },
        }
    }

    async fn try_archive(
        &self,
        repo: &crate::model::Repository,
    ) -> Result<(Vec<crate::model::Reference>, Option<i64>), Error> {
        let endpoint = repo
            .endpoints
            .first()
            .ok_or_else(|| Error::Internal("repository has no endpoints".to_owned()))?;

        let scratch = clone::clone(
            &self.settings.scratch_root,
            &repo.id.to_string(),
            disambiguator(),
            endpoint,
        )?;

        if scratch.is_empty() {
            return Ok((Vec::new(), None));
        }

        let (new_refs, symbolic) =
            referencer::enumerate(scratch.repo(), &repo.id.to_string()).map_err(Error::from)?;

        let last_commit_at = new_refs.iter().map(|r| r.committed_at).max();

        if repo.references.is_empty() {
            self.bulk_import(repo, &scratch, &new_refs).await?;
        } else {
            let by_root = differ::diff(&repo.references, &new_refs);
            let mut with_symbolic = by_root;
            for (name, target) in &symbolic {
                if let Some(reference) = new_refs.iter().find(|r| &r.name == name) {
                    with_symbolic
                        .entry(reference.init())
                        .or_default()
                        .symbolic
                        .push((name.clone(), target.clone()));
                }
            }

            let roots: Vec<_> = with_symbolic.keys().copied().collect();
            let archive_leases =
                lock::lock_roots_in_order(self.locks, &roots, self.settings.lock_timeout)
                    .await
                    .map_err(Error::from)?;

            let mut failures = 0usize;
            for (root, root_diff) in &with_symbolic {
                let tx = self.store.begin(*root).map_err(ApplierError::from)?;
                match applier::apply(
                    tx.as_ref(),
                    scratch.path(),
                    repo.id,
                    &repo.endpoints,
                    repo.is_fork,
                    root_diff,
                )
                .await
                {
                    Ok(()) => {
                        if let Err(e) = tx.commit() {
                            failures += 1;
                            tracing::warn!(root = %root, error = %e, "failed to commit rooted archive");
                        }
                    },
                    Err(e) => {
                        failures += 1;
                        tracing::warn!(root = %root, error = %e, "failed to apply changes to rooted archive");
                        tx.rollback();
                    },
                }
            }

            for lease in archive_leases {
                lease.unlock().await;
            }

            if failures > 0 {
                return Err(Error::Applier(ApplierError::PushFailed(failures)));
            }
        }

        Ok((new_refs, last_commit_at))
    }

    async fn bulk_import(
        &self,
        repo: &crate::model::Repository,
        scratch: &clone::ScratchClone,
        new_refs: &[Reference],
    ) -> Result<(), Error> {
        let mut deduped: Vec<_> = new_refs.iter().flat_map(|r| r.roots.clone()).collect();
        deduped.sort();
        deduped.dedup();

        let archive_leases =
            lock::lock_roots_in_order(self.locks, &deduped, self.settings.lock_timeout)
                .await
                .map_err(Error::from)?;

        let mut failures = 0usize;
        for root in &deduped {
            let tx = self.store.begin(*root).map_err(ApplierError::from)?;
            match applier::bulk_import(
                tx.as_ref(),
                scratch.path(),
                scratch.repo(),
                repo.id,
                &repo.endpoints,
                repo.is_fork,
            )
            .await
            {
                Ok(()) => {
                    if tx.commit().is_err() {
                        failures += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(root = %root, error = %e, "failed to bulk-import into rooted archive");
                    failures += 1;
                    tx.rollback();
                },
            }
        }

        for lease in archive_leases {
            lease.unlock().await;
        }

        if failures > 0 {
            return Err(Error::Applier(ApplierError::PushFailed(failures)));
        }

        Ok(())
    }
}

fn now_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn disambiguator() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
