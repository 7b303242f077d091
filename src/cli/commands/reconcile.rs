//! Reconcile command implementation
//!
//! Runs one reconciliation, either over an explicit window or as the next
//! scheduled tick, or keeps ticking until a shutdown signal arrives.

use super::{open, EXIT_FAILURE, EXIT_RECONCILIATION_MISMATCH, EXIT_SUCCESS};
use crate::core::reconciliation::{ReconciliationOutcome, ReconciliationScheduler};
use chrono::{DateTime, Utc};
use clap::Args;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the reconcile command
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Window start (RFC 3339); the stored cursor is neither read nor advanced
    #[arg(long, conflicts_with = "watch")]
    pub since: Option<String>,

    /// Keep running on the configured interval until interrupted
    #[arg(long)]
    pub watch: bool,
}

impl ReconcileArgs {
    /// Execute the reconcile command
    pub async fn execute(
        &self,
        config_path: &str,
        mut shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let since = match self.since.as_deref().map(parse_since).transpose() {
            Ok(since) => since,
            Err(e) => {
                println!("❌ {e}");
                return Ok(EXIT_FAILURE);
            }
        };

        let (config, stores) = match open(config_path).await {
            Ok(opened) => opened,
            Err(code) => return Ok(code),
        };

        let scheduler = ReconciliationScheduler::new(
            &stores,
            &config.reconciliation,
            config.application.dry_run,
            shutdown_signal.clone(),
        );

        if self.watch {
            println!(
                "🔁 Reconciling every {}s (Ctrl+C to stop)",
                config.reconciliation.interval_seconds
            );

            let mut handle = tokio::spawn(scheduler.run());
            tokio::select! {
                joined = &mut handle => {
                    joined?;
                    return Ok(EXIT_SUCCESS);
                }
                _ = shutdown_signal.changed() => {}
            }

            let grace = Duration::from_secs(config.reconciliation.shutdown_timeout_secs);
            return match tokio::time::timeout(grace, handle).await {
                Ok(joined) => {
                    joined?;
                    Ok(EXIT_SUCCESS)
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = grace.as_secs(),
                        "Reconciliation run did not finish before shutdown timeout"
                    );
                    Ok(EXIT_FAILURE)
                }
            };
        }

        let outcome = match since {
            Some(since) => scheduler.run_since(since).await,
            None => scheduler.tick().await,
        };

        Ok(report_outcome(&outcome))
    }
}

fn parse_since(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow::anyhow!("Invalid --since '{}': {}", raw, e))
}

/// Print the outcome and map it to an exit code
fn report_outcome(outcome: &ReconciliationOutcome) -> i32 {
    if let Some(report) = outcome.report() {
        println!("📊 Reconciliation since {}", report.since.to_rfc3339());
        println!("  Expected: {}", report.expected);
        println!("  Records inserted: {}", report.records_inserted);
        println!("  Fatal subjects: {}", report.fatal_subjects);
        println!("  Processed: {}", report.processed());
    }

    match outcome {
        ReconciliationOutcome::Matched(_) => {
            println!("✅ Counts match");
            EXIT_SUCCESS
        }
        ReconciliationOutcome::Mismatched(report) => {
            println!("❌ Counts differ by {}", report.difference());
            EXIT_RECONCILIATION_MISMATCH
        }
        ReconciliationOutcome::Failed(message) => {
            println!("❌ Reconciliation failed");
            println!("   Error: {message}");
            EXIT_FAILURE
        }
    }
}
