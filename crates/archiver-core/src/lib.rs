//! # Archiver Core
//!
//! The `archiver-core` crate implements the pipeline that discovers the root
//! commits of tracked git repositories, groups repositories that share a root
//! into deduplicated "rooted archives", and incrementally keeps each archive
//! in sync as its source repositories are re-fetched.
//!
//! ## Architecture
//!
//! - [`model`] - the data model: repository records, references, jobs
//! - [`root`] - root-commit resolution (the multi-parent, memoised DFS)
//! - [`referencer`] - reference enumeration and root annotation
//! - [`clone`] - scratch-directory mirroring of a remote repository
//! - [`differ`] - reference-list diffing, grouped by affected root
//! - [`store`] - the rooted-archive container store (open/transact/publish)
//! - [`applier`] - applies a diff to one archive transaction
//! - [`lock`] - the distributed lock abstraction archives and repositories
//!   are mutated under
//! - [`state`] - the repository status state machine
//! - [`persistence`] - the external repository-record store contract
//! - [`queue`] - the external job-queue contract
//! - [`executor`] - ties the above together into a single job run
//! - [`log`] - progress-bar and logging helpers shared across the pipeline
#![deny(missing_docs)]

pub mod applier;
pub mod clone;
pub mod differ;
pub mod error;
pub mod executor;
pub mod lock;
pub mod log;
pub mod model;
pub mod persistence;
pub mod queue;
pub mod referencer;
mod root;
pub mod state;
pub mod store;

pub use error::Error;
pub use executor::{Executor, ExecutorSettings};
pub use model::{Job, Repository, RepositoryId};
