//! Local validation of report form input.
//!
//! A [`ReportDraft`] holds the five form fields exactly as typed. Calling
//! [`ReportDraft::validate`] either yields a [`Report`] ready to send or the
//! per-field messages to show next to each input. Nothing that fails here is
//! ever sent to the backend.

use serde::{Deserialize, Serialize};

use crate::error::{FieldErrors, ReportsError, Result};
use crate::types::{Month, Report};

/// Raw, unvalidated report input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDraft {
    /// NGO identifier.
    pub ngo_id: String,
    /// Reporting period, expected as `YYYY-MM`.
    pub month: String,
    /// People helped, as typed.
    pub people_helped: String,
    /// Events conducted, as typed.
    pub events_conducted: String,
    /// Funds utilized, as typed.
    pub funds_utilized: String,
}

impl ReportDraft {
    /// Creates a draft from typed values, mostly useful in tests and
    /// non-interactive callers.
    #[must_use]
    pub fn from_values(
        ngo_id: impl Into<String>,
        month: impl Into<String>,
        people_helped: u64,
        events_conducted: u64,
        funds_utilized: u64,
    ) -> Self {
        Self {
            ngo_id: ngo_id.into(),
            month: month.into(),
            people_helped: people_helped.to_string(),
            events_conducted: events_conducted.to_string(),
            funds_utilized: funds_utilized.to_string(),
        }
    }

    /// Returns true when every field is blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        [
            &self.ngo_id,
            &self.month,
            &self.people_helped,
            &self.events_conducted,
            &self.funds_utilized,
        ]
        .iter()
        .all(|value| value.trim().is_empty())
    }

    /// Validates every field and builds the report.
    ///
    /// All fields are checked, so the returned [`ReportsError::Validation`]
    /// lists every problem at once rather than only the first.
    pub fn validate(&self) -> Result<Report> {
        let mut errors = FieldErrors::new();

        let ngo_id = self.ngo_id.trim();
        if ngo_id.is_empty() {
            errors.insert("ngo_id".into(), "NGO ID is required".into());
        }

        let month = self.month.trim();
        let month = if month.is_empty() {
            errors.insert("month".into(), "Month is required".into());
            None
        } else {
            match month.parse::<Month>() {
                Ok(month) => Some(month),
                Err(e) => {
                    errors.insert("month".into(), e.to_string());
                    None
                }
            }
        };

        let people_helped = count_field(
            &mut errors,
            "people_helped",
            &self.people_helped,
            "People helped is required",
        );
        let events_conducted = count_field(
            &mut errors,
            "events_conducted",
            &self.events_conducted,
            "Events conducted is required",
        );
        let funds_utilized = count_field(
            &mut errors,
            "funds_utilized",
            &self.funds_utilized,
            "Funds utilized is required",
        );

        match (month, people_helped, events_conducted, funds_utilized) {
            (Some(month), Some(people), Some(events), Some(funds)) if errors.is_empty() => {
                Report::new(ngo_id, month, people, events, funds)
            }
            _ => Err(ReportsError::Validation(errors)),
        }
    }
}

/// Parses a non-negative integer field, recording a message on failure.
fn count_field(
    errors: &mut FieldErrors,
    field: &str,
    raw: &str,
    required: &str,
) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<u64>() {
        return Some(value);
    }
    let message = if raw.is_empty() {
        required
    } else {
        match raw.parse::<f64>() {
            Ok(value) if !value.is_finite() => "Must be a number",
            Ok(value) if value.fract() != 0.0 => "Must be an integer",
            Ok(value) if value < 0.0 => "Must be at least 0",
            Ok(value) if value < u64::MAX as f64 => return Some(value as u64),
            _ => "Must be a number",
        }
    };
    errors.insert(field.to_string(), message.to_string());
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_error(draft: &ReportDraft, field: &str) -> Option<String> {
        match draft.validate() {
            Err(ReportsError::Validation(fields)) => fields.get(field).cloned(),
            _ => None,
        }
    }

    #[test]
    fn test_valid_draft_builds_report() {
        let draft = ReportDraft::from_values("NGO_001", "2025-09", 120, 5, 75_000);
        let report = draft.validate().unwrap();
        assert_eq!(report.ngo_id(), "NGO_001");
        assert_eq!(report.month().to_string(), "2025-09");
        assert_eq!(report.people_helped(), 120);
        assert_eq!(report.events_conducted(), 5);
        assert_eq!(report.funds_utilized(), 75_000);
    }

    #[test]
    fn test_month_format_and_range() {
        let mut draft = ReportDraft::from_values("NGO_001", "2025-9", 1, 1, 1);
        assert_eq!(
            field_error(&draft, "month").as_deref(),
            Some("Month must be in YYYY-MM format")
        );

        draft.month = "2025-13".into();
        assert_eq!(
            field_error(&draft, "month").as_deref(),
            Some("Month must be between 01 and 12")
        );

        draft.month = "2025-00".into();
        assert_eq!(
            field_error(&draft, "month").as_deref(),
            Some("Month must be between 01 and 12")
        );

        draft.month = String::new();
        assert_eq!(
            field_error(&draft, "month").as_deref(),
            Some("Month is required")
        );
    }

    #[test]
    fn test_count_fields() {
        let mut draft = ReportDraft::from_values("NGO_001", "2025-09", 1, 1, 1);

        draft.people_helped = "-3".into();
        assert_eq!(
            field_error(&draft, "people_helped").as_deref(),
            Some("Must be at least 0")
        );

        draft.people_helped = "2.5".into();
        assert_eq!(
            field_error(&draft, "people_helped").as_deref(),
            Some("Must be an integer")
        );

        draft.people_helped = "many".into();
        assert_eq!(
            field_error(&draft, "people_helped").as_deref(),
            Some("Must be a number")
        );

        draft.people_helped = " ".into();
        assert_eq!(
            field_error(&draft, "people_helped").as_deref(),
            Some("People helped is required")
        );

        draft.people_helped = "1e3".into();
        assert_eq!(draft.validate().unwrap().people_helped(), 1000);

        draft.people_helped = "0".into();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_reports_every_invalid_field() {
        let draft = ReportDraft::default();
        assert!(draft.is_blank());
        let fields = draft.validate().unwrap_err().field_errors();
        assert_eq!(
            fields.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![
                "events_conducted",
                "funds_utilized",
                "month",
                "ngo_id",
                "people_helped"
            ]
        );
    }
}
