//! Support library for the quiesce CLI binary.
//!
//! Exposes the command pipeline, topologies and renderers so tests can drive
//! them without spawning a subprocess.

pub mod cli;
pub mod logging;
pub mod render;
pub mod topology;
