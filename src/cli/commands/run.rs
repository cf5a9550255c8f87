//! The `run` subcommand: archive a single repository against a set of
//! endpoints, using the in-process reference collaborators (no external
//! queue, persistence, or lock backend is wired up yet).

use clap::Parser;

use archiver_core::executor::{Executor, ExecutorSettings};
use archiver_core::lock::LocalLockSession;
use archiver_core::model::{ForkStatus, Job};
use archiver_core::persistence::{InMemoryPersistence, Persistence};
use archiver_core::store::git::GitStore;

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
#[command(next_help_heading = "Run Options")]
pub struct Args {
    /// The endpoint(s) to clone the repository from; the first reachable one
    /// is canonical.
    #[arg(required = true)]
    endpoints: Vec<String>,
}

/// Run a single archiver job synchronously against `args.endpoints`.
pub async fn run(args: Args) -> anyhow::Result<()> {
    let cfg = &config::CONFIG;

    let persistence = InMemoryPersistence::new();
    let repository = persistence
        .create(args.endpoints, ForkStatus::Unknown)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let locks = LocalLockSession::new();
    let store = GitStore::open(cfg.store.root.clone(), cfg.store.bucket_depth)?;

    let executor = Executor::new(
        &persistence,
        &locks,
        &store,
        ExecutorSettings {
            scratch_root: cfg.scratch.root.clone(),
            lock_timeout: cfg.lock.timeout(),
            job_deadline: cfg.job.deadline(),
        },
    );

    executor
        .run(Job {
            repository_id: repository.id,
        })
        .await?;

    let updated = persistence
        .get_by_id(repository.id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(
        repository.id = %updated.id,
        status = ?updated.status,
        references = updated.references.len(),
        "job finished"
    );

    Ok(())
}
