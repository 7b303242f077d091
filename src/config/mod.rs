//! Configuration management
//!
//! TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Configuration files support:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `COHORT_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Per-section validation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cohort::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cohort.toml")?;
//!
//! println!("Max rows per extraction: {}", config.extraction.max_row_count);
//! println!("Reconcile every {}s", config.reconciliation.interval_seconds);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//! database_target = "postgresql"
//!
//! [application]
//! log_level = "info"
//!
//! [postgresql]
//! connection_string = "${COHORT_PG_CONNECTION}"
//! ssl_mode = "require"
//!
//! [extraction]
//! max_row_count = 1000
//!
//! [reconciliation]
//! interval_seconds = 3600
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, CohortConfig, DatabaseTarget, Environment, ExtractionConfig,
    IngestionConfig, LoggingConfig, PostgreSQLConfig, ReconciliationConfig, RetryConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
