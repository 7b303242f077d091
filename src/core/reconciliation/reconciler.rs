//! Reconciler
//!
//! Compares what the inbound feeds reported sending against what the
//! pipeline can account for in the same window:
//!
//! ```text
//! processed = distinct fatal subjects + records inserted
//! expected  = sum of inbound metric record counts for the audit process
//! ```
//!
//! Every count uses a strict "after `since`" bound.

use super::report::{ReconciliationOutcome, ReconciliationReport};
use crate::adapters::database::{CohortDistributionStore, ExceptionLog, InboundMetricStore, Stores};
use crate::config::ReconciliationConfig;
use crate::domain::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Checks that every received record was either committed or rejected
#[derive(Clone)]
pub struct Reconciler {
    records: Arc<dyn CohortDistributionStore + Send + Sync>,
    exceptions: Arc<dyn ExceptionLog + Send + Sync>,
    metrics: Arc<dyn InboundMetricStore + Send + Sync>,
    process_name: String,
}

impl Reconciler {
    pub fn new(stores: &Stores, config: &ReconciliationConfig) -> Self {
        Self {
            records: stores.records.clone(),
            exceptions: stores.exceptions.clone(),
            metrics: stores.metrics.clone(),
            process_name: config.process_name.clone(),
        }
    }

    /// Run the comparison for the window after `since`
    ///
    /// Never returns an error: a failed lookup becomes
    /// [`ReconciliationOutcome::Failed`] and is logged.
    pub async fn check(&self, since: DateTime<Utc>) -> ReconciliationOutcome {
        match self.gather(since).await {
            Ok(report) => {
                crate::log_reconciliation_result!(report.expected, report.processed());
                if !report.is_match() {
                    tracing::error!(
                        severity = "critical",
                        since = %report.since,
                        records_inserted = report.records_inserted,
                        fatal_subjects = report.fatal_subjects,
                        difference = report.difference(),
                        "Reconciliation breakdown"
                    );
                }
                ReconciliationOutcome::from_report(report)
            }
            Err(err) => {
                crate::log_error_with_context!(&err, "Reconciliation lookup failed");
                ReconciliationOutcome::Failed(err.to_string())
            }
        }
    }

    /// True when expected and processed counts match
    pub async fn reconcile(&self, since: DateTime<Utc>) -> bool {
        self.check(since).await.is_match()
    }

    async fn gather(&self, since: DateTime<Utc>) -> Result<ReconciliationReport> {
        let run_at = Utc::now();

        let fatal_subjects = self.exceptions.count_fatal_subjects_since(since).await?;
        let records_inserted = self.records.count_inserted_since(since).await?;
        let expected = self
            .metrics
            .sum_record_count_since(&self.process_name, since)
            .await?;

        Ok(ReconciliationReport {
            since,
            run_at,
            expected,
            records_inserted: i64::try_from(records_inserted).unwrap_or(i64::MAX),
            fatal_subjects: i64::try_from(fatal_subjects).unwrap_or(i64::MAX),
        })
    }
}
