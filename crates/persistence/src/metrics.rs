//! Database metrics collection.
//!
//! Provides functions for recording stored-procedure metrics.

use metrics::{counter, histogram};
use std::time::Instant;

/// Record how long a stored-procedure call took.
pub fn record_procedure_duration(procedure: &str, duration_secs: f64) {
    histogram!(
        "matview_procedure_duration_seconds",
        "procedure" => procedure.to_string()
    )
    .record(duration_secs);
}

/// Count a finished stored-procedure call by outcome (`ok` or `error`).
pub fn record_procedure_call(procedure: &str, outcome: &'static str) {
    counter!(
        "matview_procedure_calls_total",
        "procedure" => procedure.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// A helper to time procedure calls and record metrics.
///
/// Usage:
/// ```ignore
/// let timer = ProcedureTimer::new("update_adu");
/// let result = query.fetch_optional(&mut *conn).await;
/// timer.record(result.is_ok());
/// ```
pub struct ProcedureTimer {
    procedure: String,
    start: Instant,
}

impl ProcedureTimer {
    /// Create a new timer for the given procedure.
    pub fn new(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            start: Instant::now(),
        }
    }

    /// Record the elapsed duration and the call outcome.
    pub fn record(self, succeeded: bool) {
        let duration = self.start.elapsed().as_secs_f64();
        record_procedure_duration(&self.procedure, duration);
        record_procedure_call(&self.procedure, if succeeded { "ok" } else { "error" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_procedure_timer_creation() {
        let timer = ProcedureTimer::new("update_adu");
        assert_eq!(timer.procedure, "update_adu");
    }

    #[test]
    fn test_procedure_timer_records_without_recorder() {
        // With no global recorder installed the metrics macros are no-ops.
        let timer = ProcedureTimer::new(String::from("update_signatures"));
        timer.record(false);
    }
}
