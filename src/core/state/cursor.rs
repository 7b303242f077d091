//! Run cursor for scheduled jobs
//!
//! A cursor records where the last successful run of a scheduled job ended,
//! so the next tick knows which window to look at. It replaces any
//! in-process "last run" bookkeeping, which would be lost on restart.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Name of the reconciliation cursor
pub const RECONCILIATION_CURSOR: &str = "ReconciliationRunState";

/// Status of the last run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is in progress
    InProgress,
    /// Run completed
    Completed,
    /// Run failed
    Failed,
    /// Never run
    #[default]
    NotStarted,
}

impl RunStatus {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::NotStarted => "not_started",
        }
    }

    /// Parses the stored representation, defaulting to `NotStarted`
    pub fn parse(value: &str) -> Self {
        match value {
            "in_progress" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::NotStarted,
        }
    }
}

/// Durable cursor for a named scheduled job
///
/// # Examples
///
/// ```
/// use cohort::core::state::cursor::{RunCursorBuilder, RunStatus, RECONCILIATION_CURSOR};
/// use chrono::Utc;
///
/// let cursor = RunCursorBuilder::new(RECONCILIATION_CURSOR)
///     .last_run(Utc::now())
///     .build();
///
/// assert_eq!(cursor.last_status, RunStatus::NotStarted);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCursor {
    /// Job name, unique per cursor
    pub name: String,

    /// End of the window covered by the last successful run
    pub last_run: DateTime<Utc>,

    /// When the last run started
    pub last_started_at: DateTime<Utc>,

    /// When the last run finished (None while in progress)
    pub last_completed_at: Option<DateTime<Utc>>,

    /// Status of the last run
    pub last_status: RunStatus,

    /// Number of completed runs
    pub runs_completed: u64,
}

impl RunCursor {
    /// Window start for a run with no stored cursor
    pub fn fallback_since(now: DateTime<Utc>, lookback_hours: i64) -> DateTime<Utc> {
        now - Duration::hours(lookback_hours)
    }

    /// Mark the run as started
    pub fn mark_started(&mut self) {
        self.last_started_at = Utc::now();
        self.last_status = RunStatus::InProgress;
        self.last_completed_at = None;
    }

    /// Mark the run as completed and advance the cursor to `run_time`
    pub fn mark_completed(&mut self, run_time: DateTime<Utc>) {
        self.last_run = run_time;
        self.last_completed_at = Some(Utc::now());
        self.last_status = RunStatus::Completed;
        self.runs_completed += 1;
    }

    /// Mark the run as failed; the cursor does not move
    pub fn mark_failed(&mut self) {
        self.last_completed_at = Some(Utc::now());
        self.last_status = RunStatus::Failed;
    }

    /// Check if the last run completed
    pub fn is_completed(&self) -> bool {
        self.last_status == RunStatus::Completed
    }
}

/// Builder for creating RunCursor instances
pub struct RunCursorBuilder {
    name: String,
    last_run: Option<DateTime<Utc>>,
    last_started_at: Option<DateTime<Utc>>,
    last_completed_at: Option<DateTime<Utc>>,
    last_status: RunStatus,
    runs_completed: u64,
}

impl RunCursorBuilder {
    /// Create a new RunCursorBuilder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_run: None,
            last_started_at: None,
            last_completed_at: None,
            last_status: RunStatus::NotStarted,
            runs_completed: 0,
        }
    }

    /// Set the end of the last covered window
    pub fn last_run(mut self, timestamp: DateTime<Utc>) -> Self {
        self.last_run = Some(timestamp);
        self
    }

    /// Set the last started timestamp
    pub fn last_started_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.last_started_at = Some(timestamp);
        self
    }

    /// Set the last completed timestamp
    pub fn last_completed_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.last_completed_at = Some(timestamp);
        self
    }

    /// Set the last status
    pub fn last_status(mut self, status: RunStatus) -> Self {
        self.last_status = status;
        self
    }

    /// Set the completed run count
    pub fn runs_completed(mut self, count: u64) -> Self {
        self.runs_completed = count;
        self
    }

    /// Build the RunCursor instance
    pub fn build(self) -> RunCursor {
        let now = Utc::now();

        RunCursor {
            name: self.name,
            last_run: self.last_run.unwrap_or(now),
            last_started_at: self.last_started_at.unwrap_or(now),
            last_completed_at: self.last_completed_at,
            last_status: self.last_status,
            runs_completed: self.runs_completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cursor_builder() {
        let last_run = Utc.with_ymd_and_hms(2024, 12, 25, 0, 0, 0).unwrap();
        let cursor = RunCursorBuilder::new(RECONCILIATION_CURSOR)
            .last_run(last_run)
            .runs_completed(3)
            .build();

        assert_eq!(cursor.name, "ReconciliationRunState");
        assert_eq!(cursor.last_run, last_run);
        assert_eq!(cursor.runs_completed, 3);
        assert_eq!(cursor.last_status, RunStatus::NotStarted);
    }

    #[test]
    fn test_mark_completed_advances_cursor() {
        let start = Utc.with_ymd_and_hms(2024, 12, 25, 0, 0, 0).unwrap();
        let run_time = Utc.with_ymd_and_hms(2024, 12, 25, 1, 0, 0).unwrap();
        let mut cursor = RunCursorBuilder::new(RECONCILIATION_CURSOR)
            .last_run(start)
            .build();

        cursor.mark_started();
        assert_eq!(cursor.last_status, RunStatus::InProgress);
        assert!(cursor.last_completed_at.is_none());

        cursor.mark_completed(run_time);
        assert!(cursor.is_completed());
        assert_eq!(cursor.last_run, run_time);
        assert_eq!(cursor.runs_completed, 1);
    }

    #[test]
    fn test_mark_failed_keeps_cursor() {
        let start = Utc.with_ymd_and_hms(2024, 12, 25, 0, 0, 0).unwrap();
        let mut cursor = RunCursorBuilder::new(RECONCILIATION_CURSOR)
            .last_run(start)
            .build();

        cursor.mark_started();
        cursor.mark_failed();

        assert_eq!(cursor.last_status, RunStatus::Failed);
        assert_eq!(cursor.last_run, start);
        assert_eq!(cursor.runs_completed, 0);
    }

    #[test]
    fn test_fallback_since() {
        let now = Utc.with_ymd_and_hms(2024, 12, 26, 0, 0, 0).unwrap();
        let since = RunCursor::fallback_since(now, 24);
        assert_eq!(since, Utc.with_ymd_and_hms(2024, 12, 25, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            RunStatus::InProgress,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::NotStarted,
        ] {
            assert_eq!(RunStatus::parse(status.as_str()), status);
        }
        assert_eq!(RunStatus::parse("bogus"), RunStatus::NotStarted);
    }
}
