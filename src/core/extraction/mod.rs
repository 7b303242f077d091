//! Batch extraction
//!
//! - [`request`] - Parses raw extraction parameters
//! - [`extractor`] - Idempotent replay and compare-and-flag claims
//! - [`audit`] - Request audit queries

pub mod audit;
pub mod extractor;
pub mod request;

pub use audit::{AuditQueryParams, AuditService, AUDITED_STATUS_CODES};
pub use extractor::{BatchExtractor, ExtractionBatch};
pub use request::ExtractionRequest;
