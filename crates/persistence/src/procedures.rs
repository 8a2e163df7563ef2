//! Stored-procedure execution over a PostgreSQL connection.

use domain::models::{ProcedureCall, ProcedureOutcome};
use domain::services::ProcedureExecutor;
use domain::ProcedureError;
use sqlx::PgConnection;

use crate::metrics::ProcedureTimer;

/// Calls stored procedures on a borrowed connection.
///
/// The connection is normally a transaction's; the executor never commits.
/// Server notices raised by the procedure are logged by sqlx under the
/// `sqlx::postgres::notice` target and are not part of the outcome.
pub struct PgProcedureExecutor<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgProcedureExecutor<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl ProcedureExecutor for PgProcedureExecutor<'_> {
    async fn call(&mut self, call: &ProcedureCall) -> Result<ProcedureOutcome, ProcedureError> {
        let sql = call.to_sql();
        let mut query = sqlx::query_scalar::<_, Option<serde_json::Value>>(&sql);
        for arg in &call.args {
            query = query.bind(*arg);
        }

        let timer = ProcedureTimer::new(&call.procedure);
        let result = query.fetch_optional(&mut *self.conn).await;
        timer.record(result.is_ok());

        Ok(ProcedureOutcome {
            first_row: result?.flatten(),
            notices: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_backfill_call_binds_one_parameter() {
        let call = ProcedureCall::new(
            "update_signatures",
            vec![NaiveDate::from_ymd_opt(2014, 3, 14).unwrap()],
        );
        assert_eq!(
            call.to_sql(),
            "SELECT to_jsonb(r) FROM update_signatures($1) AS r"
        );
    }
}
