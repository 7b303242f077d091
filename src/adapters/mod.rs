//! Storage backends.
//!
//! - [`database`] - Store traits and the backend factory
//! - [`postgresql`] - PostgreSQL implementation
//! - [`memory`] - In-process implementation for tests and dry runs
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern**: the core only sees the traits in
//! [`database::traits`], and [`database::create_stores`] picks the backend
//! from configuration.
//!
//! ```rust,no_run
//! use cohort::adapters::database::create_stores;
//! use cohort::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cohort.toml")?;
//! let stores = create_stores(&config).await?;
//! let pending = stores.records.select_unextracted(10).await?;
//! println!("{} records waiting for extraction", pending.len());
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod memory;
pub mod postgresql;
