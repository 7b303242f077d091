//! Reconciliation scheduler
//!
//! Runs the reconciler on a fixed interval. The window for each run starts
//! where the last successful run began, read from the durable
//! `ReconciliationRunState` cursor; with no cursor it covers the configured
//! lookback.

use super::reconciler::Reconciler;
use super::report::ReconciliationOutcome;
use crate::adapters::database::Stores;
use crate::config::ReconciliationConfig;
use crate::core::state::{RunCursor, StateManager, RECONCILIATION_CURSOR};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Fixed-interval reconciliation loop
pub struct ReconciliationScheduler {
    reconciler: Reconciler,
    state: StateManager,
    interval: Duration,
    lookback_hours: i64,
    shutdown_signal: watch::Receiver<bool>,
}

impl ReconciliationScheduler {
    pub fn new(
        stores: &Stores,
        config: &ReconciliationConfig,
        dry_run: bool,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(stores, config),
            state: StateManager::new_with_storage(stores.state.clone()).with_dry_run(dry_run),
            interval: Duration::from_secs(config.interval_seconds.max(1)),
            lookback_hours: config.default_lookback_hours,
            shutdown_signal,
        }
    }

    /// Run one reconciliation against an explicit window start
    ///
    /// The cursor is left untouched.
    pub async fn run_since(&self, since: DateTime<Utc>) -> ReconciliationOutcome {
        self.reconciler.check(since).await
    }

    /// Run one scheduled tick
    ///
    /// The cursor advances to this tick's start time unless a lookup failed,
    /// so a failed window is covered again by the next tick.
    pub async fn tick(&self) -> ReconciliationOutcome {
        let started_at = Utc::now();
        let fallback = RunCursor::fallback_since(started_at, self.lookback_hours);

        let mut cursor = match self.state.load_or_init(RECONCILIATION_CURSOR, fallback).await {
            Ok(cursor) => cursor,
            Err(err) => {
                crate::log_error_with_context!(&err, "Failed to load reconciliation cursor");
                return ReconciliationOutcome::Failed(err.to_string());
            }
        };

        let since = cursor.last_run;
        cursor.mark_started();
        tracing::info!(since = %since, "Reconciliation run started");

        let outcome = self.reconciler.check(since).await;
        match outcome {
            ReconciliationOutcome::Failed(_) => cursor.mark_failed(),
            _ => cursor.mark_completed(started_at),
        }

        if let Err(err) = self.state.save_cursor(&cursor).await {
            crate::log_error_with_context!(&err, "Failed to save reconciliation cursor");
        }

        outcome
    }

    /// Tick until the shutdown signal fires
    ///
    /// The first tick runs immediately. A tick in progress when shutdown is
    /// signalled is allowed to finish.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Reconciliation scheduler started"
        );

        loop {
            if *self.shutdown_signal.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = self.shutdown_signal.changed() => {
                    if changed.is_err() || *self.shutdown_signal.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Reconciliation scheduler stopped");
    }
}
