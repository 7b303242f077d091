//! Inbound metric handler
//!
//! Consumes "records received" events from the message transport and
//! appends them to the inbound metric store. The transport acts on the
//! returned disposition.

use crate::adapters::database::InboundMetricStore;
use crate::domain::{InboundMetric, InboundMetricEvent};
use std::sync::Arc;

/// What the transport should do with a delivered event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricDisposition {
    /// Stored; acknowledge the message
    Complete(InboundMetric),
    /// Store write failed; leave the message for redelivery
    Defer(String),
    /// Unusable payload; move the message to the dead-letter queue
    DeadLetter(String),
}

impl MetricDisposition {
    pub fn is_complete(&self) -> bool {
        matches!(self, MetricDisposition::Complete(_))
    }
}

/// Appends inbound metric events to the store
#[derive(Clone)]
pub struct InboundMetricHandler {
    store: Arc<dyn InboundMetricStore + Send + Sync>,
}

impl InboundMetricHandler {
    pub fn new(store: Arc<dyn InboundMetricStore + Send + Sync>) -> Self {
        Self { store }
    }

    /// Handle a raw message body
    pub async fn handle_payload(&self, payload: &str) -> MetricDisposition {
        match serde_json::from_str::<InboundMetricEvent>(payload) {
            Ok(event) => self.handle(event).await,
            Err(err) => {
                tracing::warn!(error = %err, "Inbound metric payload could not be parsed");
                MetricDisposition::DeadLetter(format!("unparseable payload: {}", err))
            }
        }
    }

    /// Handle a decoded event
    pub async fn handle(&self, event: InboundMetricEvent) -> MetricDisposition {
        if event.is_empty() {
            tracing::warn!("Inbound metric event is empty");
            return MetricDisposition::DeadLetter("empty event".to_string());
        }

        let metric = event.into_metric();
        match self.store.append_metric(&metric).await {
            Ok(()) => {
                tracing::info!(
                    metric_audit_id = %metric.metric_audit_id,
                    process_name = %metric.process_name,
                    source = %metric.source,
                    record_count = metric.record_count,
                    "Inbound metric stored"
                );
                MetricDisposition::Complete(metric)
            }
            Err(err) => {
                crate::log_error_with_context!(&err, "Failed to store inbound metric");
                MetricDisposition::Defer(err.to_string())
            }
        }
    }
}
