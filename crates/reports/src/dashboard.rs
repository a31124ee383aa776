//! Dashboard read outcome.

use reports_core::{DashboardSnapshot, Month, ReportsError, Result};

/// Message shown when a dashboard read fails without a server message.
pub const DASHBOARD_FAILED: &str = "Failed to load dashboard data. Please try again.";

/// Message shown when a month has no reports.
pub const DASHBOARD_EMPTY: &str = "No reports found for the selected month.";

/// What the dashboard shows for a month.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DashboardView {
    /// Aggregates are available.
    Loaded(DashboardSnapshot),
    /// Nobody reported for the month.
    Empty {
        /// The month that was requested.
        month: Month,
    },
    /// The read failed.
    Failed {
        /// The month that was requested.
        month: Month,
        /// Banner text.
        message: String,
        /// The underlying error.
        error: ReportsError,
    },
}

impl DashboardView {
    /// Classifies the outcome of a dashboard read. An empty month is a
    /// normal view, not a failure.
    #[must_use]
    pub fn from_result(month: Month, result: Result<DashboardSnapshot>) -> Self {
        match result {
            Ok(snapshot) => Self::Loaded(snapshot),
            Err(ReportsError::EmptyState { month }) => Self::Empty { month },
            Err(error) => Self::Failed {
                month,
                message: error.general_message(DASHBOARD_FAILED),
                error,
            },
        }
    }

    /// The month this view is for.
    #[must_use]
    pub const fn month(&self) -> Month {
        match self {
            Self::Loaded(snapshot) => snapshot.month,
            Self::Empty { month } | Self::Failed { month, .. } => *month,
        }
    }

    /// The aggregates, if loaded.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&DashboardSnapshot> {
        match self {
            Self::Loaded(snapshot) => Some(snapshot),
            Self::Empty { .. } | Self::Failed { .. } => None,
        }
    }
}
