//! Bulk ingestion summary

use super::pipeline::ValidationRequest;
use crate::domain::ids::mask;
use crate::domain::CohortError;
use serde::Serialize;
use std::time::Duration;

/// A candidate that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionFailure {
    /// Masked subject key
    pub nhs_number: String,
    pub file_name: Option<String>,
    pub message: String,
}

impl IngestionFailure {
    pub fn new(request: &ValidationRequest, error: &CohortError) -> Self {
        Self {
            nhs_number: mask(request.participant.nhs_number.trim()),
            file_name: request.file_name.clone(),
            message: error.to_string(),
        }
    }
}

/// Summary of a bulk ingestion run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    /// Candidates submitted
    pub total: usize,

    /// Committed with no exception
    pub committed: usize,

    /// Committed with the exception flag set
    pub committed_with_exceptions: usize,

    /// Blocked by a fatal rule
    pub rejected: usize,

    /// Failed with a system error
    pub failed: usize,

    /// Exception log entries written for rule violations
    pub exceptions_logged: usize,

    #[serde(skip)]
    pub duration: Duration,

    pub failures: Vec<IngestionFailure>,
}

impl IngestionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn add_failure(&mut self, failure: IngestionFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    /// True when every candidate was either committed or rejected by a rule
    pub fn is_successful(&self) -> bool {
        self.failed == 0
    }

    /// Candidates that reached the distribution store
    pub fn committed_total(&self) -> usize {
        self.committed + self.committed_with_exceptions
    }

    pub fn log_summary(&self) {
        tracing::info!(
            total = self.total,
            committed = self.committed,
            committed_with_exceptions = self.committed_with_exceptions,
            rejected = self.rejected,
            failed = self.failed,
            exceptions_logged = self.exceptions_logged,
            duration_ms = self.duration.as_millis() as u64,
            "Ingestion completed"
        );

        for failure in &self.failures {
            tracing::warn!(
                nhs_number = %failure.nhs_number,
                file_name = ?failure.file_name,
                message = %failure.message,
                "Ingestion failure"
            );
        }
    }
}
