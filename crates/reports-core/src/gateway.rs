//! Gateway trait for talking to the reporting backend.
//!
//! [`ReportsGateway`] is the seam between the client's state machines and the
//! transport. The HTTP implementation lives in `reports-http`; tests plug in
//! scripted fakes.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    types::{DashboardSnapshot, IngestionJob, JobId, Month, Report, SubmitAck, UploadAccepted},
    upload::CsvUpload,
};

/// The four operations the reporting backend offers.
///
/// Every method fails with [`ReportsError::Network`](crate::ReportsError::Network)
/// on transport problems and [`ReportsError::Server`](crate::ReportsError::Server)
/// on non-2xx responses.
#[async_trait]
pub trait ReportsGateway: Send + Sync + Debug {
    /// Submits a single monthly report.
    ///
    /// A rejected report may carry per-field messages in
    /// [`ReportsError::field_errors`](crate::ReportsError::field_errors).
    async fn submit_report(&self, report: &Report) -> Result<SubmitAck>;

    /// Uploads a CSV file and returns the job that will ingest it.
    async fn upload_csv(&self, file: &CsvUpload) -> Result<UploadAccepted>;

    /// Reads the current status of an ingestion job. No side effects.
    async fn job_status(&self, job_id: &JobId) -> Result<IngestionJob>;

    /// Reads the aggregated statistics for a month.
    ///
    /// Fails with [`ReportsError::EmptyState`](crate::ReportsError::EmptyState)
    /// when no reports exist for that month.
    async fn dashboard(&self, month: Month) -> Result<DashboardSnapshot>;
}
