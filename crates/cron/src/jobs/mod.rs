//! Job execution for the command-line entry point.

mod runner;

pub use runner::{JobRunner, RunStatus, EXIT_INTERRUPTED};
