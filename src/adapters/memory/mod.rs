//! In-process storage backend
//!
//! Used for dry runs and tests. Data lives only as long as the process.

pub mod store;

pub use store::InMemoryStore;
