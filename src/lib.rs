//! The rooted-archiver CLI: discovers root commits, groups repositories into
//! deduplicated rooted archives, and incrementally keeps them in sync.

#![warn(missing_docs)]

pub mod cli;
