//! Inbound record and metric handling
//!
//! - [`pipeline`] - Validates candidates and commits or rejects them
//! - [`metrics`] - Stores "records received" events for reconciliation
//! - [`summary`] - Bulk ingestion results

pub mod metrics;
pub mod pipeline;
pub mod summary;

pub use metrics::{InboundMetricHandler, MetricDisposition};
pub use pipeline::{
    ValidationDisposition, ValidationPipeline, ValidationRequest, ValidationResponse,
};
pub use summary::{IngestionFailure, IngestionSummary};
