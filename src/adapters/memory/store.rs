//! In-process store
//!
//! Implements every store trait over plain vectors behind one async mutex.
//! Holding the lock across a whole claim gives the same one-writer-wins
//! behaviour the relational backend gets from its row-level update.

use crate::adapters::database::traits::{
    CohortDistributionStore, ExceptionLog, InboundMetricStore, RequestAuditLedger, StateStorage,
};
use crate::core::state::cursor::RunCursor;
use crate::domain::{
    AuditQuery, CohortDistributionRecord, InboundMetric, NhsNumber, RequestAuditEntry, RequestId,
    Result, StoreError, TicketUpdate, ValidationExceptionLogEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    records: Vec<CohortDistributionRecord>,
    next_record_id: i64,
    audit: Vec<RequestAuditEntry>,
    exceptions: Vec<ValidationExceptionLogEntry>,
    next_exception_id: i64,
    metrics: Vec<InboundMetric>,
    cursors: HashMap<String, RunCursor>,
}

/// In-memory implementation of all store traits
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, in insertion order
    pub async fn all_records(&self) -> Vec<CohortDistributionRecord> {
        self.tables.lock().await.records.clone()
    }

    /// Snapshot of every exception entry, in insertion order
    pub async fn all_exceptions(&self) -> Vec<ValidationExceptionLogEntry> {
        self.tables.lock().await.exceptions.clone()
    }

    /// Snapshot of every inbound metric, in insertion order
    pub async fn all_metrics(&self) -> Vec<InboundMetric> {
        self.tables.lock().await.metrics.clone()
    }
}

fn sort_for_selection(records: &mut [CohortDistributionRecord]) {
    records.sort_by(|a, b| {
        a.selection_time()
            .cmp(&b.selection_time())
            .then(a.cohort_distribution_id.cmp(&b.cohort_distribution_id))
    });
}

#[async_trait]
impl CohortDistributionStore for InMemoryStore {
    async fn insert_record(
        &self,
        mut record: CohortDistributionRecord,
    ) -> Result<CohortDistributionRecord> {
        let mut tables = self.tables.lock().await;
        tables.next_record_id += 1;
        record.cohort_distribution_id = tables.next_record_id;
        tables.records.push(record.clone());
        Ok(record)
    }

    async fn latest_for_subject(
        &self,
        nhs_number: &NhsNumber,
    ) -> Result<Option<CohortDistributionRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .records
            .iter()
            .filter(|r| &r.nhs_number == nhs_number)
            .max_by_key(|r| r.cohort_distribution_id)
            .cloned())
    }

    async fn select_unextracted(&self, row_count: usize) -> Result<Vec<CohortDistributionRecord>> {
        let tables = self.tables.lock().await;

        let mut regular: Vec<_> = tables
            .records
            .iter()
            .filter(|r| !r.is_extracted && r.request_id.is_none())
            .filter(|r| r.superseded_nhs_number.is_none())
            .cloned()
            .collect();

        if !regular.is_empty() {
            sort_for_selection(&mut regular);
            regular.truncate(row_count);
            return Ok(regular);
        }

        let extracted_subjects: HashSet<&NhsNumber> = tables
            .records
            .iter()
            .filter(|r| r.is_extracted)
            .map(|r| &r.nhs_number)
            .collect();

        let mut superseded: Vec<_> = tables
            .records
            .iter()
            .filter(|r| !r.is_extracted && r.request_id.is_none())
            .filter(|r| {
                r.superseded_nhs_number
                    .as_ref()
                    .is_some_and(|s| extracted_subjects.contains(s))
            })
            .cloned()
            .collect();

        sort_for_selection(&mut superseded);
        superseded.truncate(row_count);
        Ok(superseded)
    }

    async fn claim_records(
        &self,
        request_id: RequestId,
        ids: &[i64],
    ) -> Result<Vec<CohortDistributionRecord>> {
        let mut tables = self.tables.lock().await;
        let mut claimed = Vec::with_capacity(ids.len());

        for id in ids {
            if let Some(record) = tables
                .records
                .iter_mut()
                .find(|r| r.cohort_distribution_id == *id)
            {
                if !record.is_extracted {
                    record.mark_extracted(request_id);
                    record.record_update_datetime = Some(Utc::now());
                    claimed.push(record.clone());
                }
            }
        }

        Ok(claimed)
    }

    async fn records_for_request(
        &self,
        request_id: RequestId,
    ) -> Result<Vec<CohortDistributionRecord>> {
        let tables = self.tables.lock().await;
        let mut records: Vec<_> = tables
            .records
            .iter()
            .filter(|r| r.request_id == Some(request_id))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.cohort_distribution_id);
        Ok(records)
    }

    async fn count_inserted_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .records
            .iter()
            .filter(|r| r.record_insert_datetime > since)
            .count() as u64)
    }
}

#[async_trait]
impl RequestAuditLedger for InMemoryStore {
    async fn append_audit_entry(&self, entry: &RequestAuditEntry) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.audit.iter().any(|e| e.request_id == entry.request_id) {
            return Err(StoreError::DuplicateKey(entry.request_id.to_string()).into());
        }
        tables.audit.push(entry.clone());
        Ok(())
    }

    async fn audit_entry(&self, request_id: RequestId) -> Result<Option<RequestAuditEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .audit
            .iter()
            .find(|e| e.request_id == request_id)
            .cloned())
    }

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<RequestAuditEntry>> {
        let tables = self.tables.lock().await;
        let mut entries: Vec<_> = tables
            .audit
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn audit_entries_after(
        &self,
        created_at: DateTime<Utc>,
    ) -> Result<Vec<RequestAuditEntry>> {
        let tables = self.tables.lock().await;
        let mut entries: Vec<_> = tables
            .audit
            .iter()
            .filter(|e| e.created_at > created_at)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}

#[async_trait]
impl ExceptionLog for InMemoryStore {
    async fn append_exception(
        &self,
        mut entry: ValidationExceptionLogEntry,
    ) -> Result<ValidationExceptionLogEntry> {
        let mut tables = self.tables.lock().await;
        tables.next_exception_id += 1;
        entry.exception_id = tables.next_exception_id;
        tables.exceptions.push(entry.clone());
        Ok(entry)
    }

    async fn count_fatal_subjects_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let tables = self.tables.lock().await;
        let subjects: HashSet<&str> = tables
            .exceptions
            .iter()
            .filter(|e| e.is_fatal && e.created_at > since)
            .map(|e| e.subject_key.trim())
            .filter(|key| !key.is_empty())
            .collect();
        Ok(subjects.len() as u64)
    }

    async fn exceptions_for_subject(
        &self,
        subject_key: &str,
    ) -> Result<Vec<ValidationExceptionLogEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .exceptions
            .iter()
            .filter(|e| e.subject_key == subject_key)
            .cloned()
            .collect())
    }

    async fn attach_ticket(&self, update: &TicketUpdate) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .exceptions
            .iter_mut()
            .find(|e| e.exception_id == update.exception_id)
            .ok_or_else(|| StoreError::NotFound(format!("exception {}", update.exception_id)))?;

        entry.ticket_id = Some(update.ticket_id.clone());
        entry.ticket_created_at = Some(update.ticket_created_at);
        entry.record_updated_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl InboundMetricStore for InMemoryStore {
    async fn append_metric(&self, metric: &InboundMetric) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables
            .metrics
            .iter()
            .any(|m| m.metric_audit_id == metric.metric_audit_id)
        {
            return Err(StoreError::DuplicateKey(metric.metric_audit_id.to_string()).into());
        }
        tables.metrics.push(metric.clone());
        Ok(())
    }

    async fn sum_record_count_since(
        &self,
        process_name: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .metrics
            .iter()
            .filter(|m| m.process_name == process_name && m.received_date_time > since)
            .map(|m| m.record_count)
            .sum())
    }
}

#[async_trait]
impl StateStorage for InMemoryStore {
    async fn load_cursor(&self, name: &str) -> Result<Option<RunCursor>> {
        Ok(self.tables.lock().await.cursors.get(name).cloned())
    }

    async fn save_cursor(&self, cursor: &RunCursor, dry_run: bool) -> Result<()> {
        if dry_run {
            tracing::debug!(cursor = %cursor.name, "Dry run: skipping cursor save");
            return Ok(());
        }
        self.tables
            .lock()
            .await
            .cursors
            .insert(cursor.name.clone(), cursor.clone());
        Ok(())
    }
}
