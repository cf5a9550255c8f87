//! The main entry point for the rooted-archiver CLI.

#![warn(missing_docs)]

use std::process::ExitCode;

use clap::Parser;
use rooted_archiver::cli::{self, Args};

//================================================================================================
// Functions
//================================================================================================

/// The main entry point for the rooted-archiver CLI.
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse_from(cli::change_directory());
    let Args { log, .. } = args;

    let _guard = cli::init_global_subscriber(log);

    if let Err(e) = cli::run(args).await {
        rooted_archiver::fatal!(e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
