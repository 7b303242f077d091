//! Domain models and types for the cohort pipeline.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`NhsNumber`], [`RequestId`])
//! - **Domain models** ([`Participant`], [`CohortDistributionRecord`],
//!   [`RequestAuditEntry`], [`ValidationExceptionLogEntry`], [`InboundMetric`])
//! - **Error types** ([`CohortError`], [`StoreError`], [`ExtractionError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Subject keys are only trusted once they have been parsed into an
//! [`NhsNumber`], which checks the modulus 11 check digit:
//!
//! ```rust
//! use cohort::domain::{NhsNumber, RequestId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let nhs_number = NhsNumber::new("9876543210")?;
//! let request_id = RequestId::generate();
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod errors;
pub mod exception;
pub mod ids;
pub mod metric;
pub mod participant;
pub mod result;

// Re-export commonly used types for convenience
pub use audit::{AuditQuery, RequestAuditEntry};
pub use errors::{CohortError, ExceptionContext, ExtractionError, StoreError};
pub use exception::{ExceptionCategory, TicketUpdate, ValidationExceptionLogEntry};
pub use ids::{NhsNumber, RequestId};
pub use metric::{InboundMetric, InboundMetricEvent, AUDIT_PROCESS};
pub use participant::{
    CohortDistributionRecord, DeathStatus, Demographics, Participant, ParticipantBuilder,
    RecordType,
};
pub use result::Result;
