//! Command-line interface for running termination detection over built-in
//! topologies.
//!
//! The single `run` command builds the spanning tree, races the seeded
//! workers against the detector and prints the verdict with a node census.

mod commands;

pub use commands::{Cli, CliError, Command, ExecutionSummary, RunCommand, render_summary, run_cli};
