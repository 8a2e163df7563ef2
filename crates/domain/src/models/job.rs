//! Matview job descriptors.
//!
//! A job binds a scheduling name to the stored procedure it invokes and the
//! rule used to build that procedure's arguments.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::JobError;

lazy_static::lazy_static! {
    /// Plain SQL identifier, optionally schema-qualified.
    pub static ref PROCEDURE_NAME_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z_][a-z0-9_]*(\.[a-z_][a-z0-9_]*)?$").unwrap();
}

/// How a backfill job derives its target date from the run date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum DateStrategy {
    /// The day before the run date.
    PreviousDay,
    /// The day the run date falls on after moving it back by `hours`.
    Shifted { hours: i64 },
}

impl DateStrategy {
    /// Compute the target date for `run_date`. Time of day is discarded.
    pub fn target_date(&self, run_date: NaiveDateTime) -> Option<NaiveDate> {
        let offset = match self {
            DateStrategy::PreviousDay => Duration::days(1),
            DateStrategy::Shifted { hours } => Duration::hours(*hours),
        };
        run_date.checked_sub_signed(offset).map(|shifted| shifted.date())
    }
}

impl fmt::Display for DateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateStrategy::PreviousDay => write!(f, "previous day"),
            DateStrategy::Shifted { hours } => write!(f, "shifted back {}h", hours),
        }
    }
}

/// Argument construction rule for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Call the procedure with no arguments.
    Simple,
    /// Call the procedure with a single target date.
    Backfill(DateStrategy),
}

impl JobMode {
    pub fn is_backfill(&self) -> bool {
        matches!(self, JobMode::Backfill(_))
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::Simple => write!(f, "simple"),
            JobMode::Backfill(strategy) => write!(f, "backfill ({})", strategy),
        }
    }
}

/// One scheduled maintenance job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    pub name: String,
    pub procedure_name: String,
    pub mode: JobMode,
    pub dependencies: Vec<String>,
    pub description: String,
}

impl JobDescriptor {
    /// A job that calls `procedure_name()` with no arguments.
    pub fn simple(name: impl Into<String>, procedure_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            procedure_name: procedure_name.into(),
            mode: JobMode::Simple,
            dependencies: Vec::new(),
            description: String::new(),
        }
    }

    /// A job that calls `procedure_name(target_date)` with the day before the run date.
    pub fn backfill(name: impl Into<String>, procedure_name: impl Into<String>) -> Self {
        Self {
            mode: JobMode::Backfill(DateStrategy::PreviousDay),
            ..Self::simple(name, procedure_name)
        }
    }

    /// Replace the date strategy. Turns a simple job into a backfill job.
    pub fn with_strategy(mut self, strategy: DateStrategy) -> Self {
        self.mode = JobMode::Backfill(strategy);
        self
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn has_valid_procedure_name(&self) -> bool {
        PROCEDURE_NAME_REGEX.is_match(&self.procedure_name)
    }

    /// Plan the argument-less call of a simple job.
    pub fn plan_simple(&self) -> Result<ProcedureCall, JobError> {
        match self.mode {
            JobMode::Simple => Ok(ProcedureCall::new(&self.procedure_name, Vec::new())),
            JobMode::Backfill(_) => Err(JobError::WrongMode {
                job: self.name.clone(),
                mode: self.mode,
            }),
        }
    }

    /// Plan the single-date call of a backfill job for `run_date`.
    pub fn plan_backfill(&self, run_date: NaiveDateTime) -> Result<ProcedureCall, JobError> {
        let JobMode::Backfill(strategy) = self.mode else {
            return Err(JobError::WrongMode {
                job: self.name.clone(),
                mode: self.mode,
            });
        };

        let target_date = strategy
            .target_date(run_date)
            .ok_or_else(|| JobError::DateOutOfRange {
                job: self.name.clone(),
                run_date,
            })?;

        Ok(ProcedureCall::new(&self.procedure_name, vec![target_date]))
    }

    /// Plan a call according to the job's mode.
    ///
    /// Simple jobs ignore `run_date`; backfill jobs require it.
    pub fn plan(&self, run_date: Option<NaiveDateTime>) -> Result<ProcedureCall, JobError> {
        match (self.mode, run_date) {
            (JobMode::Simple, _) => self.plan_simple(),
            (JobMode::Backfill(_), Some(run_date)) => self.plan_backfill(run_date),
            (JobMode::Backfill(_), None) => Err(JobError::MissingRunDate(self.name.clone())),
        }
    }
}

/// A planned stored-procedure invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureCall {
    pub procedure: String,
    pub args: Vec<NaiveDate>,
}

impl ProcedureCall {
    pub fn new(procedure: impl Into<String>, args: Vec<NaiveDate>) -> Self {
        Self {
            procedure: procedure.into(),
            args,
        }
    }

    /// SQL selecting the first result row of the call as JSON.
    ///
    /// The procedure name is interpolated, so it must have passed
    /// [`PROCEDURE_NAME_REGEX`]; arguments are bind parameters.
    pub fn to_sql(&self) -> String {
        let placeholders = (1..=self.args.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "SELECT to_jsonb(r) FROM {}({}) AS r",
            self.procedure, placeholders
        )
    }
}

impl fmt::Display for ProcedureCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .args
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({})", self.procedure, args)
    }
}

/// What a procedure call produced, kept for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcedureOutcome {
    pub first_row: Option<serde_json::Value>,
    /// Server notices captured by the executor. The Postgres executor leaves
    /// this empty; sqlx logs notices itself under the
    /// `sqlx::postgres::notice` target.
    pub notices: Vec<String>,
}
