//! Domain services for the matview jobs.
//!
//! Services contain the job execution logic that operates on domain models.

pub mod matview;

pub use matview::{
    run_backfill, run_job, run_simple, ProcedureExecutor, RecordingExecutor, TransactionRunner,
};
