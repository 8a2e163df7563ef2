//! Domain models for the matview jobs.

pub mod catalog;
pub mod job;

pub use catalog::{matview_jobs, JobCatalog, DEFAULT_EXTERNAL_JOBS};
pub use job::{DateStrategy, JobDescriptor, JobMode, ProcedureCall, ProcedureOutcome};
