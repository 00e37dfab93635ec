//! Command-line front end for ask context resolution.
//! Parses flags, selects a seed from a url or webhook payload, runs the
//! traversal against GitHub and renders the result.

pub mod bootstrap_helpers;
pub mod cli_args;
pub mod runner;

pub use cli_args::{Cli, CliOutputFormat};
pub use runner::{run, RunOutcome};
