//! Domain layer for the crash pipeline matview jobs.
//!
//! This crate contains:
//! - Job descriptors, date strategies and the validated job catalog
//! - The procedure execution service and its executor/transaction seams
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::{CatalogError, JobError, ProcedureError};
