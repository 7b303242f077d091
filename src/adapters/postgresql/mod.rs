//! PostgreSQL database integration
//!
//! This module provides the relational backend for every store trait.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
pub use models::PostgreSQLRunCursor;
