//! Store abstraction layer
//!
//! This module provides a trait-based abstraction for persistence, allowing
//! the pipeline to run against PostgreSQL or the in-memory backend.

pub mod factory;
pub mod traits;

pub use factory::{create_stores, Stores};
pub use traits::{
    CohortDistributionStore, ExceptionLog, InboundMetricStore, RequestAuditLedger, StateStorage,
};
