//! Runs one catalog job and reports how it went.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use domain::models::{JobDescriptor, ProcedureOutcome};
use domain::services::TransactionRunner;
use domain::JobError;
use metrics::counter;
use tracing::{error, info, info_span, warn, Instrument};

use crate::signals::Shutdown;

/// Exit code of an invocation stopped by SIGINT or SIGTERM.
pub const EXIT_INTERRUPTED: i32 = 130;

/// How a job run ended.
#[derive(Debug)]
pub enum RunStatus {
    Completed(ProcedureOutcome),
    Failed(JobError),
    /// Shutdown was requested before the job finished. Its transaction was
    /// abandoned and rolls back.
    Interrupted,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Completed(_) => 0,
            RunStatus::Failed(_) => 1,
            RunStatus::Interrupted => EXIT_INTERRUPTED,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RunStatus::Completed(_) => "success",
            RunStatus::Failed(_) => "failure",
            RunStatus::Interrupted => "interrupted",
        }
    }
}

/// Runs jobs through a [`TransactionRunner`], logging and counting each run.
#[derive(Clone)]
pub struct JobRunner {
    transactions: Arc<dyn TransactionRunner>,
}

impl JobRunner {
    pub fn new(transactions: Arc<dyn TransactionRunner>) -> Self {
        Self { transactions }
    }

    /// Run `job` to completion.
    pub async fn run(
        &self,
        job: &JobDescriptor,
        run_date: Option<NaiveDateTime>,
    ) -> Result<ProcedureOutcome, JobError> {
        let span = info_span!("job", job = %job.name, mode = %job.mode);
        let start = Instant::now();

        async {
            info!(run_date = ?run_date, "Job starting");

            let result = self.transactions.run_job(job, run_date).await;
            let elapsed = start.elapsed();
            match &result {
                Ok(_) => {
                    info!(elapsed_ms = elapsed.as_millis(), "Job completed successfully");
                }
                Err(e) => {
                    error!(
                        elapsed_ms = elapsed.as_millis(),
                        error = %e,
                        "Job failed"
                    );
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Run `job` unless shutdown is requested first.
    pub async fn run_until_shutdown(
        &self,
        job: &JobDescriptor,
        run_date: Option<NaiveDateTime>,
        shutdown: &mut Shutdown,
    ) -> RunStatus {
        let status = if shutdown.is_requested() {
            warn!(job = %job.name, "Shutdown requested before the job started");
            RunStatus::Interrupted
        } else {
            tokio::select! {
                result = self.run(job, run_date) => match result {
                    Ok(outcome) => RunStatus::Completed(outcome),
                    Err(e) => RunStatus::Failed(e),
                },
                _ = shutdown.requested() => {
                    warn!(job = %job.name, "Job interrupted, transaction rolled back");
                    RunStatus::Interrupted
                }
            }
        };

        counter!(
            "matview_job_runs_total",
            "job" => job.name.clone(),
            "status" => status.label()
        )
        .increment(1);

        status
    }
}
