//! State manager for run cursor persistence

use crate::adapters::database::traits::StateStorage;
use crate::core::state::cursor::{RunCursor, RunCursorBuilder};
use crate::domain::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// State manager for run cursors
///
/// Loads and saves the cursors that tell a scheduled job where its previous
/// successful run ended.
pub struct StateManager {
    storage: Arc<dyn StateStorage + Send + Sync>,
    dry_run: bool,
}

impl StateManager {
    /// Create a new StateManager with a state storage backend
    pub fn new_with_storage(storage: Arc<dyn StateStorage + Send + Sync>) -> Self {
        Self {
            storage,
            dry_run: false,
        }
    }

    /// Skip cursor writes
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Load a cursor
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(RunCursor))` if found, `Ok(None)` if not found, or an error.
    pub async fn load_cursor(&self, name: &str) -> Result<Option<RunCursor>> {
        self.storage.load_cursor(name).await
    }

    /// Load a cursor, or create one whose window starts at `fallback`
    pub async fn load_or_init(&self, name: &str, fallback: DateTime<Utc>) -> Result<RunCursor> {
        match self.storage.load_cursor(name).await? {
            Some(cursor) => Ok(cursor),
            None => {
                tracing::info!(
                    cursor = name,
                    since = %fallback,
                    "No stored cursor, starting from fallback window"
                );
                Ok(RunCursorBuilder::new(name).last_run(fallback).build())
            }
        }
    }

    /// Save a cursor
    pub async fn save_cursor(&self, cursor: &RunCursor) -> Result<()> {
        tracing::debug!(
            cursor = %cursor.name,
            last_run = %cursor.last_run,
            status = cursor.last_status.as_str(),
            "Saving run cursor"
        );

        self.storage.save_cursor(cursor, self.dry_run).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::core::state::cursor::{RunStatus, RECONCILIATION_CURSOR};
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_load_or_init_uses_fallback() {
        let manager = StateManager::new_with_storage(Arc::new(InMemoryStore::new()));
        let fallback = Utc.with_ymd_and_hms(2024, 12, 25, 0, 0, 0).unwrap();

        let cursor = manager
            .load_or_init(RECONCILIATION_CURSOR, fallback)
            .await
            .unwrap();

        assert_eq!(cursor.last_run, fallback);
        assert_eq!(cursor.last_status, RunStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let manager = StateManager::new_with_storage(Arc::new(InMemoryStore::new()));
        let run_time = Utc.with_ymd_and_hms(2024, 12, 25, 6, 0, 0).unwrap();

        let mut cursor = RunCursorBuilder::new(RECONCILIATION_CURSOR).build();
        cursor.mark_completed(run_time);
        manager.save_cursor(&cursor).await.unwrap();

        let loaded = manager
            .load_cursor(RECONCILIATION_CURSOR)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.last_run, run_time);
        assert!(loaded.is_completed());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_persist() {
        let manager =
            StateManager::new_with_storage(Arc::new(InMemoryStore::new())).with_dry_run(true);

        let cursor = RunCursorBuilder::new(RECONCILIATION_CURSOR).build();
        manager.save_cursor(&cursor).await.unwrap();

        assert!(manager
            .load_cursor(RECONCILIATION_CURSOR)
            .await
            .unwrap()
            .is_none());
    }
}
