// Cohort - Screening cohort distribution pipeline
// Copyright (c) 2025 Cohort Manager Contributors
// Licensed under the MIT License

//! # Cohort - screening cohort distribution pipeline
//!
//! Cohort takes candidate participant records from inbound feeds, validates
//! them against a fixed rule set, commits the ones that pass to a
//! distribution store, and hands committed records out in idempotent
//! batches to downstream consumers. A scheduled reconciliation checks that
//! every record the feeds reported sending was either committed or
//! rejected.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`api`] - Endpoint handlers returning status codes and JSON bodies
//! - [`core`] - Validation, extraction, reconciliation and exception logging
//! - [`adapters`] - PostgreSQL and in-memory stores
//! - [`domain`] - Domain types, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cohort::adapters::database::create_stores;
//! use cohort::config::load_config;
//! use cohort::core::extraction::BatchExtractor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cohort.toml")?;
//! let stores = create_stores(&config).await?;
//!
//! let extractor = BatchExtractor::new(&stores, &config.extraction);
//! let batch = extractor.extract_raw(Some("100"), None).await?;
//! println!("Handed out {} records under {:?}", batch.len(), batch.request_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Validation
//!
//! ```rust,no_run
//! use cohort::adapters::database::Stores;
//! use cohort::config::IngestionConfig;
//! use cohort::core::ingestion::{ValidationPipeline, ValidationRequest};
//! use cohort::domain::Participant;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stores = Stores::in_memory();
//! let pipeline = ValidationPipeline::new(&stores, &IngestionConfig::default());
//!
//! let participant = Participant::builder()
//!     .nhs_number("9434765919")
//!     .raw_record_type("ADD")
//!     .build()?;
//! let disposition = pipeline
//!     .validate(ValidationRequest::new(participant, Some("BSS.json".to_string())))
//!     .await?;
//! println!("{:?}", disposition.response());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Library functions return [`domain::Result`], whose error type is
//! [`domain::CohortError`]. The CLI maps failures onto exit codes: 1 for a
//! failed command, 2 for configuration errors and 3 when reconciliation
//! counts differ.

pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
