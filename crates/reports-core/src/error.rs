//! Error types for reporting operations.
//!
//! This module defines [`ReportsError`] which covers every failure the client
//! can run into: local validation, transport failures, server rejections, the
//! dashboard's "no data" signal, and jobs that finish in the `failed` state.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::{JobId, Month};

/// Per-field error messages, keyed by the wire name of the field
/// (`ngo_id`, `month`, ...).
pub type FieldErrors = BTreeMap<String, String>;

/// Errors that can occur while talking to the reporting backend.
///
/// The type is `Clone` so that one failed request can be handed to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportsError {
    /// Local validation failed; nothing was sent.
    #[error("Validation failed: {}", summarize(.0))]
    Validation(FieldErrors),

    /// Transport-level failure (connect, timeout, broken body).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("Server error ({status}){}", with_colon(.message))]
    Server {
        /// HTTP status code.
        status: u16,
        /// General message for a banner or toast.
        message: String,
        /// Field-level messages reported by the server, if any.
        field_errors: FieldErrors,
    },

    /// The dashboard has no data for the requested month.
    #[error("No reports found for {month}")]
    EmptyState {
        /// The month that was requested.
        month: Month,
    },

    /// An ingestion job finished in the `failed` state.
    #[error("Job {job_id} failed: {message}")]
    JobFailed {
        /// The job that failed.
        job_id: JobId,
        /// The server's failure description.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ReportsError {
    /// Returns true for failures worth retrying. Only transport failures
    /// qualify; anything the server said is final.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns the field-level messages carried by this error.
    ///
    /// Local validation errors and server rejections both carry them; every
    /// other variant returns an empty map.
    #[must_use]
    pub fn field_errors(&self) -> FieldErrors {
        match self {
            Self::Validation(fields) => fields.clone(),
            Self::Server { field_errors, .. } => field_errors.clone(),
            _ => FieldErrors::new(),
        }
    }

    /// Returns the message to show in a banner, falling back to `fallback`
    /// when the server did not provide one.
    #[must_use]
    pub fn general_message(&self, fallback: &str) -> String {
        match self {
            Self::Server { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::JobFailed { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::InvalidParameter(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

fn summarize(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn with_colon(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

/// Result type alias using [`ReportsError`].
pub type Result<T> = std::result::Result<T, ReportsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(ReportsError::Network("timed out".into()).is_transient());
        assert!(
            !ReportsError::Server {
                status: 500,
                message: "boom".into(),
                field_errors: FieldErrors::new(),
            }
            .is_transient()
        );
        assert!(!ReportsError::Parse("bad json".into()).is_transient());
        assert!(
            !ReportsError::EmptyState {
                month: "2025-08".parse().unwrap()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_general_message_prefers_server_text() {
        let err = ReportsError::Server {
            status: 422,
            message: "Duplicate report".into(),
            field_errors: FieldErrors::new(),
        };
        assert_eq!(err.general_message("fallback"), "Duplicate report");

        let blank = ReportsError::Server {
            status: 500,
            message: "  ".into(),
            field_errors: FieldErrors::new(),
        };
        assert_eq!(blank.general_message("fallback"), "fallback");
        assert_eq!(
            ReportsError::Network("reset".into()).general_message("fallback"),
            "fallback"
        );
    }

    #[test]
    fn test_validation_display_lists_fields() {
        let mut fields = FieldErrors::new();
        fields.insert("month".into(), "Month is required".into());
        fields.insert("ngo_id".into(), "NGO ID is required".into());
        let err = ReportsError::Validation(fields);
        assert_eq!(
            err.to_string(),
            "Validation failed: month: Month is required; ngo_id: NGO ID is required"
        );
        assert_eq!(err.field_errors().len(), 2);
    }
}
