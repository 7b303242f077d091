//! Request audit domain model

use super::ids::RequestId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One extraction request as recorded in the request audit
///
/// Entries are written once and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestAuditEntry {
    pub request_id: RequestId,
    pub status_code: u16,
    pub created_at: DateTime<Utc>,
    pub row_count_requested: i32,
}

impl RequestAuditEntry {
    /// Creates a new entry stamped with the current time
    pub fn new(request_id: RequestId, status_code: u16, row_count_requested: i32) -> Self {
        Self {
            request_id,
            status_code,
            created_at: Utc::now(),
            row_count_requested,
        }
    }

    /// True when the request handed out records
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Filter for request audit queries
///
/// All set fields must match; an empty filter returns every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    pub request_id: Option<RequestId>,
    pub status_code: Option<u16>,
    /// Entries created on or after the start of this day (UTC)
    pub date_from: Option<NaiveDate>,
}

impl AuditQuery {
    /// Returns true when `entry` satisfies every set filter
    pub fn matches(&self, entry: &RequestAuditEntry) -> bool {
        if let Some(request_id) = self.request_id {
            if entry.request_id != request_id {
                return false;
            }
        }
        if let Some(status_code) = self.status_code {
            if entry.status_code != status_code {
                return false;
            }
        }
        if let Some(date_from) = self.date_from {
            if entry.created_at.date_naive() < date_from {
                return false;
            }
        }
        true
    }
}
