//! Inbound metric domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Process name whose metrics count towards reconciliation
pub const AUDIT_PROCESS: &str = "AuditProcess";

/// Acknowledgement of an inbound batch, as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMetric {
    pub metric_audit_id: Uuid,
    pub process_name: String,
    pub received_date_time: DateTime<Utc>,
    pub source: String,
    pub record_count: i64,
}

/// Inbound metric event as delivered by the message transport
///
/// Every field is optional on the wire; an event with nothing usable in it
/// is structurally empty and gets dead-lettered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMetricEvent {
    pub audit_process: Option<String>,
    pub received_date_time: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub record_count: Option<i64>,
}

impl InboundMetricEvent {
    /// True when the event carries no process name and no count
    pub fn is_empty(&self) -> bool {
        self.audit_process
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
            && self.record_count.is_none()
    }

    /// Converts the event into a storable metric with a fresh id
    ///
    /// Missing fields fall back to the current time, an empty source and a
    /// zero count.
    pub fn into_metric(self) -> InboundMetric {
        InboundMetric {
            metric_audit_id: Uuid::new_v4(),
            process_name: self.audit_process.unwrap_or_default(),
            received_date_time: self.received_date_time.unwrap_or_else(Utc::now),
            source: self.source.unwrap_or_default(),
            record_count: self.record_count.unwrap_or(0),
        }
    }
}
