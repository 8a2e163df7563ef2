//! Transaction handling for matview job runs.

use chrono::NaiveDateTime;
use domain::models::{JobDescriptor, ProcedureOutcome};
use domain::services::{self, TransactionRunner};
use domain::JobError;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::procedures::PgProcedureExecutor;

/// Runs each job in its own transaction on the pool.
///
/// Commits when the job succeeds. On failure the transaction is rolled back
/// and the job's error is returned unchanged.
#[derive(Clone)]
pub struct PgTransactionRunner {
    pool: PgPool,
}

impl PgTransactionRunner {
    /// Creates a new PgTransactionRunner with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl TransactionRunner for PgTransactionRunner {
    async fn run_job(
        &self,
        job: &JobDescriptor,
        run_date: Option<NaiveDateTime>,
    ) -> Result<ProcedureOutcome, JobError> {
        let mut tx = self.pool.begin().await?;
        debug!(job = %job.name, "Transaction started");

        let result = {
            let mut executor = PgProcedureExecutor::new(&mut *tx);
            services::run_job(&mut executor, job, run_date).await
        };

        match result {
            Ok(outcome) => {
                tx.commit().await?;
                debug!(job = %job.name, "Transaction committed");
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        job = %job.name,
                        error = %rollback_err,
                        "Rollback failed after job error"
                    );
                } else {
                    debug!(job = %job.name, "Transaction rolled back");
                }
                Err(err)
            }
        }
    }
}
