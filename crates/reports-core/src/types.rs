//! Core data types for the reporting backend.
//!
//! This module defines the values that cross the HTTP boundary:
//!
//! - [`Month`] - A validated `YYYY-MM` reporting period
//! - [`Report`] - One NGO's monthly activity report
//! - [`JobId`] / [`JobStatus`] / [`IngestionJob`] - Bulk upload job tracking
//! - [`DashboardSnapshot`] - Aggregated statistics for one month
//! - [`SubmitAck`] / [`UploadAccepted`] - Write acknowledgements

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{FieldErrors, ReportsError, Result};

/// Why a string was rejected as a [`Month`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthParseError {
    /// The value is not exactly four digits, a dash, and two digits.
    #[error("Month must be in YYYY-MM format")]
    Format,
    /// The month component is outside 01-12.
    #[error("Month must be between 01 and 12")]
    OutOfRange,
}

/// A reporting period in `YYYY-MM` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: u16,
    month: u8,
}

impl Month {
    /// Creates a month from its components.
    pub fn new(year: u16, month: u8) -> std::result::Result<Self, MonthParseError> {
        if year > 9999 {
            return Err(MonthParseError::Format);
        }
        if !(1..=12).contains(&month) {
            return Err(MonthParseError::OutOfRange);
        }
        Ok(Self { year, month })
    }

    /// Returns the current month in local time.
    #[must_use]
    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: u16::try_from(today.year()).unwrap_or(9999).min(9999),
            month: today.month() as u8,
        }
    }

    /// Returns the year component.
    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// Returns the month component (1-12).
    #[must_use]
    pub const fn month(&self) -> u8 {
        self.month
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = MonthParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(MonthParseError::Format);
        }
        let year = s[..4].parse().map_err(|_| MonthParseError::Format)?;
        let month = s[5..].parse().map_err(|_| MonthParseError::Format)?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for Month {
    type Error = MonthParseError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(month: Month) -> Self {
        month.to_string()
    }
}

/// Opaque identifier of a bulk ingestion job.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a job id from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One NGO's activity report for a month.
///
/// Reports are only built from input that passed validation, either through
/// [`Report::new`] or [`ReportDraft::validate`](crate::validate::ReportDraft::validate).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    ngo_id: String,
    month: Month,
    people_helped: u64,
    events_conducted: u64,
    funds_utilized: u64,
}

impl Report {
    /// Creates a report, trimming the NGO id and rejecting it when blank.
    pub fn new(
        ngo_id: impl Into<String>,
        month: Month,
        people_helped: u64,
        events_conducted: u64,
        funds_utilized: u64,
    ) -> Result<Self> {
        let ngo_id = ngo_id.into().trim().to_string();
        if ngo_id.is_empty() {
            let mut fields = FieldErrors::new();
            fields.insert("ngo_id".into(), "NGO ID is required".into());
            return Err(ReportsError::Validation(fields));
        }
        Ok(Self {
            ngo_id,
            month,
            people_helped,
            events_conducted,
            funds_utilized,
        })
    }

    /// The reporting NGO.
    #[must_use]
    pub fn ngo_id(&self) -> &str {
        &self.ngo_id
    }

    /// The reporting period.
    #[must_use]
    pub const fn month(&self) -> Month {
        self.month
    }

    /// Number of people helped during the month.
    #[must_use]
    pub const fn people_helped(&self) -> u64 {
        self.people_helped
    }

    /// Number of events conducted during the month.
    #[must_use]
    pub const fn events_conducted(&self) -> u64 {
        self.events_conducted
    }

    /// Funds utilized during the month, in whole currency units.
    #[must_use]
    pub const fn funds_utilized(&self) -> u64 {
        self.funds_utilized
    }
}

/// Lifecycle status of an ingestion job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, not started.
    Pending,
    /// Rows are being ingested.
    Processing,
    /// Every row was ingested.
    Success,
    /// Ingestion stopped with an error.
    Failed,
}

impl JobStatus {
    /// Returns true once no further progress can happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Position along pending -> processing -> {success, failed}.
    #[must_use]
    pub const fn stage(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Success | Self::Failed => 2,
        }
    }

    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a job, as far as the client can tell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// The server has not counted the rows yet (`total == 0`).
    Indeterminate,
    /// Rows counted; `processed` is clamped to `total`.
    Determinate {
        /// Rows ingested so far.
        processed: u64,
        /// Rows in the file.
        total: u64,
        /// Rounded percentage, 0-100.
        percent: u8,
    },
}

/// Server-side state of a bulk upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionJob {
    /// The job this status belongs to.
    pub job_id: JobId,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Rows ingested so far.
    pub processed: u64,
    /// Rows in the file, or 0 while unknown.
    pub total: u64,
    /// Failure description, present when `status` is `failed`.
    pub error_message: Option<String>,
}

impl IngestionJob {
    /// Creates a job status with no progress and no error.
    #[must_use]
    pub const fn new(job_id: JobId, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            processed: 0,
            total: 0,
            error_message: None,
        }
    }

    /// Sets the row counters.
    #[must_use]
    pub const fn with_progress(mut self, processed: u64, total: u64) -> Self {
        self.processed = processed;
        self.total = total;
        self
    }

    /// Sets the failure description.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Returns true once the job reached success or failed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Computes displayable progress. A zero total means "unknown", not
    /// "0 of 0".
    #[must_use]
    pub fn progress(&self) -> Progress {
        if self.total == 0 {
            return Progress::Indeterminate;
        }
        let processed = self.processed.min(self.total);
        let percent = ((processed as f64 / self.total as f64) * 100.0).round() as u8;
        Progress::Determinate {
            processed,
            total: self.total,
            percent,
        }
    }

    /// Converts a `failed` job into a [`ReportsError::JobFailed`].
    pub fn into_result(self) -> Result<Self> {
        if self.status == JobStatus::Failed {
            return Err(ReportsError::JobFailed {
                message: self
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Upload failed".to_string()),
                job_id: self.job_id,
            });
        }
        Ok(self)
    }
}

/// Aggregated statistics for one month.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// The month these totals cover.
    pub month: Month,
    /// Distinct NGOs that reported.
    pub total_ngos_reporting: u64,
    /// Sum of people helped.
    pub total_people_helped: u64,
    /// Sum of events conducted.
    pub total_events_conducted: u64,
    /// Sum of funds utilized.
    pub total_funds_utilized: u64,
}

/// Acknowledgement of a single report submission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// Server message, empty when none was sent.
    #[serde(default)]
    pub message: String,
}

/// Acknowledgement of a CSV upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAccepted {
    /// Identifier to poll for the upload's progress.
    pub job_id: JobId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_parsing() {
        let month: Month = "2025-09".parse().unwrap();
        assert_eq!(month.year(), 2025);
        assert_eq!(month.month(), 9);
        assert_eq!(month.to_string(), "2025-09");

        assert_eq!("2025-9".parse::<Month>(), Err(MonthParseError::Format));
        assert_eq!("25-09".parse::<Month>(), Err(MonthParseError::Format));
        assert_eq!("2025/09".parse::<Month>(), Err(MonthParseError::Format));
        assert_eq!("2025-09-01".parse::<Month>(), Err(MonthParseError::Format));
        assert_eq!("２０２５-09".parse::<Month>(), Err(MonthParseError::Format));
        assert_eq!("2025-00".parse::<Month>(), Err(MonthParseError::OutOfRange));
        assert_eq!("2025-13".parse::<Month>(), Err(MonthParseError::OutOfRange));
        assert!("2025-12".parse::<Month>().is_ok());
        assert!("2025-01".parse::<Month>().is_ok());
    }

    #[test]
    fn test_month_serde_roundtrip_uses_string_form() {
        let month: Month = "2024-02".parse().unwrap();
        assert_eq!(serde_json::to_string(&month).unwrap(), "\"2024-02\"");
        assert!(serde_json::from_str::<Month>("\"2024-14\"").is_err());
    }

    #[test]
    fn test_current_month_is_valid() {
        let current = Month::current();
        assert!((1..=12).contains(&current.month()));
        assert_eq!(current.to_string().parse::<Month>().unwrap(), current);
    }

    #[test]
    fn test_report_trims_and_requires_ngo_id() {
        let month = "2025-09".parse().unwrap();
        let report = Report::new("  NGO_001 ", month, 120, 5, 75_000).unwrap();
        assert_eq!(report.ngo_id(), "NGO_001");

        let err = Report::new("   ", month, 0, 0, 0).unwrap_err();
        assert!(err.field_errors().contains_key("ngo_id"));
    }

    #[test]
    fn test_report_serializes_wire_shape() {
        let month = "2025-09".parse().unwrap();
        let report = Report::new("NGO_001", month, 120, 5, 75_000).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ngo_id": "NGO_001",
                "month": "2025-09",
                "people_helped": 120,
                "events_conducted": 5,
                "funds_utilized": 75000
            })
        );
    }

    #[test]
    fn test_job_status_order() {
        assert!(JobStatus::Pending.stage() < JobStatus::Processing.stage());
        assert!(JobStatus::Processing.stage() < JobStatus::Success.stage());
        assert_eq!(JobStatus::Success.stage(), JobStatus::Failed.stage());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_progress_treats_zero_total_as_unknown() {
        let job = IngestionJob::new(JobId::new("J1"), JobStatus::Pending);
        assert_eq!(job.progress(), Progress::Indeterminate);

        let job = job.with_progress(50, 200);
        assert_eq!(
            job.progress(),
            Progress::Determinate {
                processed: 50,
                total: 200,
                percent: 25
            }
        );

        let overshoot = IngestionJob::new(JobId::new("J1"), JobStatus::Processing)
            .with_progress(250, 200);
        assert_eq!(
            overshoot.progress(),
            Progress::Determinate {
                processed: 200,
                total: 200,
                percent: 100
            }
        );
    }

    #[test]
    fn test_failed_job_into_result() {
        let job = IngestionJob::new(JobId::new("J2"), JobStatus::Failed)
            .with_error("row 5: invalid month");
        assert_eq!(
            job.into_result(),
            Err(ReportsError::JobFailed {
                job_id: JobId::new("J2"),
                message: "row 5: invalid month".into()
            })
        );
    }
}
