//! Reconciliation
//!
//! - [`reconciler`] - Expected versus processed record counts for a window
//! - [`scheduler`] - Fixed-interval runs over a durable cursor
//! - [`report`] - Run results

pub mod reconciler;
pub mod report;
pub mod scheduler;

pub use reconciler::Reconciler;
pub use report::{ReconciliationOutcome, ReconciliationReport};
pub use scheduler::ReconciliationScheduler;
