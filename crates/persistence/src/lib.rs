//! Persistence layer for the crash pipeline matview jobs.
//!
//! This crate contains:
//! - Database connection management
//! - The PostgreSQL stored-procedure executor
//! - The transaction runner that wraps one job run
//! - Procedure call metrics

pub mod db;
pub mod metrics;
pub mod procedures;
pub mod transaction;

pub use procedures::PgProcedureExecutor;
pub use transaction::PgTransactionRunner;
