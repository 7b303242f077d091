// Durable run cursors for scheduled jobs

pub mod cursor;
pub mod manager;

pub use cursor::{RunCursor, RunCursorBuilder, RunStatus, RECONCILIATION_CURSOR};
pub use manager::StateManager;
