//! Core pipeline logic.
//!
//! # Modules
//!
//! - [`validation`] - Rule registry and validator
//! - [`exceptions`] - Writes exception log entries
//! - [`ingestion`] - Validation pipeline and inbound metric handler
//! - [`extraction`] - Batch extractor and request audit queries
//! - [`reconciliation`] - Reconciler and its scheduler
//! - [`state`] - Durable run cursors
//! - [`retry`] - Retry policy
//!
//! # Flow
//!
//! 1. **Validate**: each candidate runs through the rule registry
//! 2. **Route**: fatal violations go to the exception log only; everything
//!    else is committed, flagged when non-fatal rules fired
//! 3. **Extract**: the consumer pulls unextracted records in batches, each
//!    batch tagged with a request id recorded in the request audit
//! 4. **Reconcile**: on a schedule, inbound metric totals are compared with
//!    committed records plus fatally rejected subjects
//!
//! # Example
//!
//! ```rust,no_run
//! use cohort::adapters::database::create_stores;
//! use cohort::config::load_config;
//! use cohort::core::extraction::{BatchExtractor, ExtractionRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cohort.toml")?;
//! let stores = create_stores(&config).await?;
//!
//! let extractor = BatchExtractor::new(&stores, &config.extraction);
//! let batch = extractor.extract(ExtractionRequest::new(100, None)).await?;
//!
//! println!("{} records under {:?}", batch.len(), batch.request_id);
//! # Ok(())
//! # }
//! ```

pub mod exceptions;
pub mod extraction;
pub mod ingestion;
pub mod reconciliation;
pub mod retry;
pub mod state;
pub mod validation;
