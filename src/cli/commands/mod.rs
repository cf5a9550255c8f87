//! This module defines the subcommands for the archiver CLI.
//!
//! Each subcommand is implemented in its own module and is responsible for
//! handling its own arguments and logic. The `run` function in this module
//! dispatches to the appropriate subcommand based on the parsed arguments.

use clap::Subcommand;

use super::Args;

mod run;

//================================================================================================
// Types
//================================================================================================

/// The subcommands for the archiver CLI.
#[derive(Subcommand)]
pub(super) enum Commands {
    /// Archive a single repository from the given endpoint(s).
    ///
    /// This is a thin demonstration entrypoint: it wires the in-process
    /// reference lock session and an ephemeral in-memory repository record
    /// around a single job executor run. A production deployment instead
    /// runs the executor against a real job queue and persistence backend.
    Run(run::Args),
}

//================================================================================================
// Functions
//================================================================================================

/// The main entry point for the archiver CLI.
pub async fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Commands::Run(args) => run::run(args).await,
    }
}
