//! Reconciliation report

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counts gathered by one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// Start of the window (exclusive)
    pub since: DateTime<Utc>,

    /// When the counts were taken
    pub run_at: DateTime<Utc>,

    /// Records the inbound feeds said they sent
    pub expected: i64,

    /// Records committed to the distribution store in the window
    pub records_inserted: i64,

    /// Distinct subjects rejected by a fatal rule in the window
    pub fatal_subjects: i64,
}

impl ReconciliationReport {
    /// Records accounted for, either committed or rejected
    pub fn processed(&self) -> i64 {
        self.records_inserted + self.fatal_subjects
    }

    pub fn is_match(&self) -> bool {
        self.expected == self.processed()
    }

    /// Expected minus processed; positive means records are missing
    pub fn difference(&self) -> i64 {
        self.expected - self.processed()
    }
}

/// Result of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    Matched(ReconciliationReport),
    Mismatched(ReconciliationReport),
    /// A count could not be read; nothing was compared
    Failed(String),
}

impl ReconciliationOutcome {
    pub fn from_report(report: ReconciliationReport) -> Self {
        if report.is_match() {
            ReconciliationOutcome::Matched(report)
        } else {
            ReconciliationOutcome::Mismatched(report)
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, ReconciliationOutcome::Matched(_))
    }

    pub fn report(&self) -> Option<&ReconciliationReport> {
        match self {
            ReconciliationOutcome::Matched(report) | ReconciliationOutcome::Mismatched(report) => {
                Some(report)
            }
            ReconciliationOutcome::Failed(_) => None,
        }
    }
}
