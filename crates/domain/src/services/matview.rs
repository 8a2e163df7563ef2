//! Matview job execution.
//!
//! The functions here plan a job's procedure call and hand it to a
//! [`ProcedureExecutor`] that is already bound to an open transaction. They
//! never begin, commit or roll back themselves.

use chrono::NaiveDateTime;
use tracing::info;

use crate::error::{JobError, ProcedureError};
use crate::models::{JobDescriptor, ProcedureCall, ProcedureOutcome};

/// Executes stored-procedure calls on a transactional connection.
#[async_trait::async_trait]
pub trait ProcedureExecutor: Send {
    /// Call the procedure and return its first result row and any notices.
    async fn call(&mut self, call: &ProcedureCall) -> Result<ProcedureOutcome, ProcedureError>;
}

/// Runs a whole job inside a transaction it owns.
#[async_trait::async_trait]
pub trait TransactionRunner: Send + Sync {
    /// Begin, run `job` for `run_date`, then commit, or roll back on error.
    async fn run_job(
        &self,
        job: &JobDescriptor,
        run_date: Option<NaiveDateTime>,
    ) -> Result<ProcedureOutcome, JobError>;
}

/// Run a simple job: call its procedure with no arguments.
pub async fn run_simple<E>(executor: &mut E, job: &JobDescriptor) -> Result<ProcedureOutcome, JobError>
where
    E: ProcedureExecutor + ?Sized,
{
    let call = job.plan_simple()?;
    execute(executor, job, &call).await
}

/// Run a backfill job: call its procedure with the target date for `run_date`.
pub async fn run_backfill<E>(
    executor: &mut E,
    job: &JobDescriptor,
    run_date: NaiveDateTime,
) -> Result<ProcedureOutcome, JobError>
where
    E: ProcedureExecutor + ?Sized,
{
    let call = job.plan_backfill(run_date)?;
    execute(executor, job, &call).await
}

/// Run any job according to its mode.
pub async fn run_job<E>(
    executor: &mut E,
    job: &JobDescriptor,
    run_date: Option<NaiveDateTime>,
) -> Result<ProcedureOutcome, JobError>
where
    E: ProcedureExecutor + ?Sized,
{
    let call = job.plan(run_date)?;
    execute(executor, job, &call).await
}

async fn execute<E>(
    executor: &mut E,
    job: &JobDescriptor,
    call: &ProcedureCall,
) -> Result<ProcedureOutcome, JobError>
where
    E: ProcedureExecutor + ?Sized,
{
    let outcome = executor.call(call).await?;

    // Neither the result row nor the notices decide success.
    match &outcome.first_row {
        Some(row) => info!(job = %job.name, calling = %call, result = %row, "Result from calling procedure"),
        None => info!(job = %job.name, calling = %call, "Procedure returned no rows"),
    }
    if !outcome.notices.is_empty() {
        info!(
            job = %job.name,
            calling = %call,
            notices = ?outcome.notices,
            "Notices from calling procedure"
        );
    }

    Ok(outcome)
}

/// Executor that records calls instead of talking to a database.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub calls: Vec<ProcedureCall>,
    pub outcome: ProcedureOutcome,
    pub fail_with: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor whose calls return `outcome`.
    pub fn returning(outcome: ProcedureOutcome) -> Self {
        Self {
            outcome,
            ..Self::default()
        }
    }

    /// An executor whose calls fail with a database error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl ProcedureExecutor for RecordingExecutor {
    async fn call(&mut self, call: &ProcedureCall) -> Result<ProcedureOutcome, ProcedureError> {
        self.calls.push(call.clone());
        match &self.fail_with {
            Some(message) => Err(ProcedureError::Database(sqlx::Error::Protocol(
                message.clone(),
            ))),
            None => Ok(self.outcome.clone()),
        }
    }
}
