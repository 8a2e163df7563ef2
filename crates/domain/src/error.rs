//! Domain error types.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::JobMode;

/// Catalog construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate job name: {0}")]
    DuplicateJob(String),

    #[error("Job {job} has an invalid procedure name: {procedure:?}")]
    InvalidProcedureName { job: String, procedure: String },

    #[error("Job {job} depends on unknown job {dependency}")]
    UnknownDependency { job: String, dependency: String },

    #[error("Dependency cycle between jobs: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("External job {0} has the same name as a catalog job")]
    ExternalShadowsJob(String),
}

/// Errors raised by a stored-procedure call.
#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Errors raised while running a catalog job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Job {0} is a backfill job and needs a run date")]
    MissingRunDate(String),

    #[error("Job {job} cannot be run that way, its mode is {mode}")]
    WrongMode { job: String, mode: JobMode },

    #[error("Run date {run_date} is out of range for job {job}")]
    DateOutOfRange { job: String, run_date: NaiveDateTime },

    #[error(transparent)]
    Procedure(#[from] ProcedureError),
}

impl From<sqlx::Error> for JobError {
    fn from(err: sqlx::Error) -> Self {
        JobError::Procedure(ProcedureError::Database(err))
    }
}
