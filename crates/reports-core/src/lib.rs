#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the NGO monthly reporting client.
//!
//! This crate provides the foundational abstractions shared by every other
//! crate in the workspace:
//!
//! - [`ReportsGateway`](gateway::ReportsGateway) - The backend's four operations
//! - [`ReportsError`](error::ReportsError) - Error taxonomy
//! - [`ReportDraft`](validate::ReportDraft) - Local form validation
//! - [`CsvUpload`](upload::CsvUpload) - Files for bulk upload

/// Error types for reporting operations.
pub mod error;
/// Gateway trait for the reporting backend.
pub mod gateway;
/// Core data types (Month, Report, IngestionJob, ...).
pub mod types;
/// CSV upload files.
pub mod upload;
/// Local validation of report input.
pub mod validate;

// Re-export commonly used items at crate root
pub use error::{FieldErrors, ReportsError, Result};
pub use gateway::ReportsGateway;
pub use types::{
    DashboardSnapshot, IngestionJob, JobId, JobStatus, Month, MonthParseError, Progress, Report,
    SubmitAck, UploadAccepted,
};
pub use upload::{CSV_COLUMNS, CSV_MIME, CsvUpload};
pub use validate::ReportDraft;
