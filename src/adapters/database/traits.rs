//! Store abstraction traits
//!
//! This module defines the traits that storage adapters must implement.
//! One trait per logical table; a single adapter usually implements all
//! of them over a shared connection pool.

use crate::core::state::cursor::RunCursor;
use crate::domain::{
    AuditQuery, CohortDistributionRecord, InboundMetric, NhsNumber, RequestAuditEntry, RequestId,
    Result, TicketUpdate, ValidationExceptionLogEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Cohort distribution records
///
/// Inserts come from the validation pipeline; the extraction flag and
/// request id are only ever changed through [`claim_records`].
///
/// [`claim_records`]: CohortDistributionStore::claim_records
#[async_trait]
pub trait CohortDistributionStore: Send + Sync {
    /// Insert a new record, returning it with its assigned surrogate id
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    async fn insert_record(&self, record: CohortDistributionRecord)
        -> Result<CohortDistributionRecord>;

    /// Most recently inserted record for a subject, used as the prior
    /// version by cross-record rules
    ///
    /// Ordered by surrogate id; claiming a record must not change which
    /// version counts as latest.
    async fn latest_for_subject(
        &self,
        nhs_number: &NhsNumber,
    ) -> Result<Option<CohortDistributionRecord>>;

    /// Candidate records for a fresh extraction, without claiming them
    ///
    /// Regular records (no superseded NHS number) come first. Only when none
    /// are left are superseded records returned, and then only those whose
    /// superseded subject already has an extracted record. Within a tier the
    /// order is oldest selection time first, then surrogate id.
    async fn select_unextracted(&self, row_count: usize) -> Result<Vec<CohortDistributionRecord>>;

    /// Compare-and-flag claim
    ///
    /// Marks each listed record as extracted under `request_id`, but only if
    /// it is still unextracted at claim time. Returns the records actually
    /// claimed by this call; rows taken by a concurrent caller are skipped.
    async fn claim_records(
        &self,
        request_id: RequestId,
        ids: &[i64],
    ) -> Result<Vec<CohortDistributionRecord>>;

    /// Records already handed out under `request_id`, in surrogate id order
    async fn records_for_request(&self, request_id: RequestId)
        -> Result<Vec<CohortDistributionRecord>>;

    /// Number of records inserted strictly after `since`
    async fn count_inserted_since(&self, since: DateTime<Utc>) -> Result<u64>;
}

/// Append-only request audit
#[async_trait]
pub trait RequestAuditLedger: Send + Sync {
    /// Append an entry
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateKey` if the request id already exists.
    async fn append_audit_entry(&self, entry: &RequestAuditEntry) -> Result<()>;

    /// Look up a single entry
    async fn audit_entry(&self, request_id: RequestId) -> Result<Option<RequestAuditEntry>>;

    /// Entries matching `query`, oldest first
    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<RequestAuditEntry>>;

    /// Entries created strictly after `created_at`, oldest first
    async fn audit_entries_after(&self, created_at: DateTime<Utc>)
        -> Result<Vec<RequestAuditEntry>>;
}

/// Append-only exception log
#[async_trait]
pub trait ExceptionLog: Send + Sync {
    /// Append an entry, returning it with its assigned surrogate id
    async fn append_exception(
        &self,
        entry: ValidationExceptionLogEntry,
    ) -> Result<ValidationExceptionLogEntry>;

    /// Distinct non-blank subject keys with a fatal entry created after `since`
    async fn count_fatal_subjects_since(&self, since: DateTime<Utc>) -> Result<u64>;

    /// All entries for a subject, oldest first
    async fn exceptions_for_subject(&self, subject_key: &str)
        -> Result<Vec<ValidationExceptionLogEntry>>;

    /// Attach an external ticket reference to an existing entry
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no entry has that id.
    async fn attach_ticket(&self, update: &TicketUpdate) -> Result<()>;
}

/// Append-only inbound metric store
#[async_trait]
pub trait InboundMetricStore: Send + Sync {
    /// Append a metric
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateKey` if the metric id already exists.
    async fn append_metric(&self, metric: &InboundMetric) -> Result<()>;

    /// Sum of record counts for `process_name` received strictly after `since`
    async fn sum_record_count_since(&self, process_name: &str, since: DateTime<Utc>)
        -> Result<i64>;
}

/// Durable run cursors for scheduled jobs
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Load a cursor by name
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(RunCursor))` if found, `Ok(None)` if not found.
    async fn load_cursor(&self, name: &str) -> Result<Option<RunCursor>>;

    /// Save a cursor
    ///
    /// # Arguments
    ///
    /// * `cursor` - Cursor to save
    /// * `dry_run` - If true, skip the write
    async fn save_cursor(&self, cursor: &RunCursor, dry_run: bool) -> Result<()>;
}
