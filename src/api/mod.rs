//! Endpoint contracts
//!
//! Transport-agnostic handlers for the extraction, validation, audit and
//! inbound metric endpoints. An HTTP or message-bus binding only has to
//! decode parameters and write back the returned status and body.

pub mod handlers;
pub mod responses;

pub use handlers::CohortApi;
pub use responses::{ApiResponse, ExtractionResponse};
