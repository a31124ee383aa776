//! Report form state.

use reports_core::{FieldErrors, Report, ReportDraft};

use crate::mutation::MutationFailure;

/// Input and feedback of the single report form.
///
/// Holds what the user typed, the message shown next to each field, and a
/// banner for errors that belong to no single field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportForm {
    draft: ReportDraft,
    field_errors: FieldErrors,
    banner: Option<String>,
}

impl ReportForm {
    /// An empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A form pre-filled with `draft`.
    #[must_use]
    pub fn with_draft(draft: ReportDraft) -> Self {
        Self {
            draft,
            ..Self::default()
        }
    }

    /// Current input.
    #[must_use]
    pub const fn draft(&self) -> &ReportDraft {
        &self.draft
    }

    /// Mutable access to the input.
    pub fn draft_mut(&mut self) -> &mut ReportDraft {
        &mut self.draft
    }

    /// All field messages.
    #[must_use]
    pub const fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    /// Message for one field.
    #[must_use]
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors.get(field).map(String::as_str)
    }

    /// Banner message, if any.
    #[must_use]
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Validates the input, replacing the field messages with the outcome.
    /// Clears the banner.
    pub fn validate(&mut self) -> Option<Report> {
        self.banner = None;
        match self.draft.validate() {
            Ok(report) => {
                self.field_errors.clear();
                Some(report)
            }
            Err(err) => {
                self.field_errors = err.field_errors();
                None
            }
        }
    }

    /// Shows a failed submission: server field messages next to their fields
    /// and the general message in the banner.
    pub fn apply_failure(&mut self, failure: &MutationFailure) {
        for (field, message) in &failure.field_errors {
            self.field_errors.insert(field.clone(), message.clone());
        }
        self.banner = Some(failure.message.clone());
    }

    /// Empties the input and all feedback.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
