//! Command-line runner for the matview maintenance jobs.

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod signals;
