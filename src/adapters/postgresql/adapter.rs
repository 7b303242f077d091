//! PostgreSQL adapter implementing the store traits
//!
//! Every trait method is a single SQL statement, so each one is atomic on
//! its own. The extraction claim relies on this: the `is_extracted = FALSE`
//! predicate and the flag update run in one `UPDATE`, and PostgreSQL's row
//! locking lets exactly one concurrent claimant win each row.

use crate::adapters::database::traits::{
    CohortDistributionStore, ExceptionLog, InboundMetricStore, RequestAuditLedger, StateStorage,
};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{
    audit_entry_from_row, death_status_to_sql, exception_from_row, record_from_row,
    PostgreSQLRunCursor, EXCEPTION_COLUMNS, RECORD_COLUMNS,
};
use crate::core::state::cursor::RunCursor;
use crate::domain::{
    AuditQuery, CohortDistributionRecord, InboundMetric, NhsNumber, RequestAuditEntry, RequestId,
    Result, StoreError, TicketUpdate, ValidationExceptionLogEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// PostgreSQL implementation of the store traits
///
/// This wraps the PostgreSQLClient and implements every store trait over its pool.
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Create a new PostgreSQL adapter with an Arc-wrapped client
    pub fn new_with_arc(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }

    /// Check that the database is reachable
    pub async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    /// Create missing tables and indexes
    pub async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }

    async fn query_records(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<CohortDistributionRecord>> {
        let rows = self.client.query(sql, params).await?;
        rows.iter().map(record_from_row).collect()
    }
}

fn limit_param(row_count: usize) -> i64 {
    i64::try_from(row_count).unwrap_or(i64::MAX)
}

#[async_trait]
impl CohortDistributionStore for PostgreSQLAdapter {
    async fn insert_record(
        &self,
        record: CohortDistributionRecord,
    ) -> Result<CohortDistributionRecord> {
        let sql = format!(
            r#"
            INSERT INTO cohort_distribution (
                participant_id, nhs_number, superseded_nhs_number, screening_name,
                primary_care_provider, primary_care_provider_effective_from_date,
                name_prefix, given_name, other_given_names, family_name, previous_family_name,
                date_of_birth, gender, address_line1, address_line2, address_line3,
                address_line4, address_line5, postcode, current_posting,
                current_posting_effective_from_date, date_of_death, death_status,
                telephone_number_home, telephone_number_mobile, email_address_home,
                preferred_language, interpreter_required, reason_for_removal,
                reason_for_removal_effective_from_date, exception_flag, is_extracted,
                request_id, record_insert_datetime, record_update_datetime
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30,
                    $31, $32, $33, $34, $35)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );

        let d = &record.demographics;
        let nhs_number = record.nhs_number.as_str();
        let superseded = record.superseded_nhs_number.as_ref().map(|n| n.as_str());
        let death_status = death_status_to_sql(d.death_status);
        let request_id: Option<Uuid> = record.request_id.map(|id| id.as_uuid());

        let rows = self
            .client
            .query(
                &sql,
                &[
                    &record.participant_id,
                    &nhs_number,
                    &superseded,
                    &record.screening_name,
                    &d.primary_care_provider,
                    &d.primary_care_provider_effective_from_date,
                    &d.name_prefix,
                    &d.given_name,
                    &d.other_given_names,
                    &d.family_name,
                    &d.previous_family_name,
                    &d.date_of_birth,
                    &d.gender,
                    &d.address_line1,
                    &d.address_line2,
                    &d.address_line3,
                    &d.address_line4,
                    &d.address_line5,
                    &d.postcode,
                    &d.current_posting,
                    &d.current_posting_effective_from_date,
                    &d.date_of_death,
                    &death_status,
                    &d.telephone_number_home,
                    &d.telephone_number_mobile,
                    &d.email_address_home,
                    &d.preferred_language,
                    &d.interpreter_required,
                    &d.reason_for_removal,
                    &d.reason_for_removal_effective_from_date,
                    &record.exception_flag,
                    &record.is_extracted,
                    &request_id,
                    &record.record_insert_datetime,
                    &record.record_update_datetime,
                ],
            )
            .await?;

        let row = rows
            .first()
            .ok_or_else(|| StoreError::InsertFailed("INSERT returned no row".to_string()))?;

        let stored = record_from_row(row)?;
        tracing::debug!(
            cohort_distribution_id = stored.cohort_distribution_id,
            nhs_number = %stored.nhs_number.masked(),
            "Inserted cohort distribution record"
        );
        Ok(stored)
    }

    async fn latest_for_subject(
        &self,
        nhs_number: &NhsNumber,
    ) -> Result<Option<CohortDistributionRecord>> {
        let sql = format!(
            "SELECT {} FROM cohort_distribution WHERE nhs_number = $1 \
             ORDER BY cohort_distribution_id DESC LIMIT 1",
            RECORD_COLUMNS
        );
        let mut records = self.query_records(&sql, &[&nhs_number.as_str()]).await?;
        Ok(records.pop())
    }

    async fn select_unextracted(&self, row_count: usize) -> Result<Vec<CohortDistributionRecord>> {
        let limit = limit_param(row_count);

        let regular_sql = format!(
            "SELECT {} FROM cohort_distribution \
             WHERE is_extracted = FALSE AND request_id IS NULL AND superseded_nhs_number IS NULL \
             ORDER BY COALESCE(record_update_datetime, record_insert_datetime), \
             cohort_distribution_id LIMIT $1",
            RECORD_COLUMNS
        );
        let regular = self.query_records(&regular_sql, &[&limit]).await?;
        if !regular.is_empty() {
            return Ok(regular);
        }

        let superseded_sql = format!(
            "SELECT {} FROM cohort_distribution cd \
             WHERE cd.is_extracted = FALSE AND cd.request_id IS NULL \
             AND cd.superseded_nhs_number IS NOT NULL \
             AND EXISTS (SELECT 1 FROM cohort_distribution x \
                         WHERE x.nhs_number = cd.superseded_nhs_number AND x.is_extracted = TRUE) \
             ORDER BY COALESCE(cd.record_update_datetime, cd.record_insert_datetime), \
             cd.cohort_distribution_id LIMIT $1",
            RECORD_COLUMNS
        );
        self.query_records(&superseded_sql, &[&limit]).await
    }

    async fn claim_records(
        &self,
        request_id: RequestId,
        ids: &[i64],
    ) -> Result<Vec<CohortDistributionRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "UPDATE cohort_distribution \
             SET is_extracted = TRUE, request_id = $1, record_update_datetime = NOW() \
             WHERE cohort_distribution_id = ANY($2) AND is_extracted = FALSE \
             RETURNING {}",
            RECORD_COLUMNS
        );
        let uuid = request_id.as_uuid();
        let mut claimed = self.query_records(&sql, &[&uuid, &ids]).await?;
        claimed.sort_by_key(|r| r.cohort_distribution_id);

        tracing::debug!(
            request_id = %request_id,
            requested = ids.len(),
            claimed = claimed.len(),
            "Claimed cohort distribution records"
        );
        Ok(claimed)
    }

    async fn records_for_request(
        &self,
        request_id: RequestId,
    ) -> Result<Vec<CohortDistributionRecord>> {
        let sql = format!(
            "SELECT {} FROM cohort_distribution WHERE request_id = $1 \
             ORDER BY cohort_distribution_id",
            RECORD_COLUMNS
        );
        let uuid = request_id.as_uuid();
        self.query_records(&sql, &[&uuid]).await
    }

    async fn count_inserted_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let rows = self
            .client
            .query(
                "SELECT COUNT(*) FROM cohort_distribution WHERE record_insert_datetime > $1",
                &[&since],
            )
            .await?;
        count_from_rows(&rows)
    }
}

fn count_from_rows(rows: &[tokio_postgres::Row]) -> Result<u64> {
    let row = rows
        .first()
        .ok_or_else(|| StoreError::Decode("COUNT returned no row".to_string()))?;
    let count: i64 = row
        .try_get(0)
        .map_err(|e| StoreError::Decode(format!("count: {}", e)))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

#[async_trait]
impl RequestAuditLedger for PostgreSQLAdapter {
    async fn append_audit_entry(&self, entry: &RequestAuditEntry) -> Result<()> {
        let status_code = i16::try_from(entry.status_code)
            .map_err(|_| StoreError::InsertFailed(format!("status code {}", entry.status_code)))?;
        let uuid = entry.request_id.as_uuid();

        self.client
            .execute(
                "INSERT INTO cohort_request_audit \
                 (request_id, status_code, created_at, row_count_requested) \
                 VALUES ($1, $2, $3, $4)",
                &[
                    &uuid,
                    &status_code,
                    &entry.created_at,
                    &entry.row_count_requested,
                ],
            )
            .await?;

        tracing::debug!(
            request_id = %entry.request_id,
            status_code = entry.status_code,
            "Appended request audit entry"
        );
        Ok(())
    }

    async fn audit_entry(&self, request_id: RequestId) -> Result<Option<RequestAuditEntry>> {
        let uuid = request_id.as_uuid();
        let rows = self
            .client
            .query(
                "SELECT request_id, status_code, created_at, row_count_requested \
                 FROM cohort_request_audit WHERE request_id = $1",
                &[&uuid],
            )
            .await?;
        rows.first().map(audit_entry_from_row).transpose()
    }

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<RequestAuditEntry>> {
        let request_id: Option<Uuid> = query.request_id.map(|id| id.as_uuid());
        let status_code: Option<i16> = match query.status_code {
            Some(code) => Some(i16::try_from(code).map_err(|_| {
                StoreError::QueryFailed(format!("status code {} out of range", code))
            })?),
            None => None,
        };
        let date_from: Option<DateTime<Utc>> = query
            .date_from
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc());

        let rows = self
            .client
            .query(
                "SELECT request_id, status_code, created_at, row_count_requested \
                 FROM cohort_request_audit \
                 WHERE ($1::uuid IS NULL OR request_id = $1) \
                 AND ($2::smallint IS NULL OR status_code = $2) \
                 AND ($3::timestamptz IS NULL OR created_at >= $3) \
                 ORDER BY created_at",
                &[&request_id, &status_code, &date_from],
            )
            .await?;
        rows.iter().map(audit_entry_from_row).collect()
    }

    async fn audit_entries_after(
        &self,
        created_at: DateTime<Utc>,
    ) -> Result<Vec<RequestAuditEntry>> {
        let rows = self
            .client
            .query(
                "SELECT request_id, status_code, created_at, row_count_requested \
                 FROM cohort_request_audit WHERE created_at > $1 ORDER BY created_at",
                &[&created_at],
            )
            .await?;
        rows.iter().map(audit_entry_from_row).collect()
    }
}

#[async_trait]
impl ExceptionLog for PostgreSQLAdapter {
    async fn append_exception(
        &self,
        entry: ValidationExceptionLogEntry,
    ) -> Result<ValidationExceptionLogEntry> {
        let sql = format!(
            "INSERT INTO exception_management \
             (rule_id, rule_description, nhs_number, file_name, is_fatal, category, \
              error_record, screening_name, cohort_name, date_created) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            EXCEPTION_COLUMNS
        );
        let rule_id = i32::from(entry.rule_id);
        let category = entry.category.code();

        let rows = self
            .client
            .query(
                &sql,
                &[
                    &rule_id,
                    &entry.rule_description,
                    &entry.subject_key,
                    &entry.file_name,
                    &entry.is_fatal,
                    &category,
                    &entry.error_record,
                    &entry.screening_name,
                    &entry.cohort_name,
                    &entry.created_at,
                ],
            )
            .await?;

        let row = rows
            .first()
            .ok_or_else(|| StoreError::InsertFailed("INSERT returned no row".to_string()))?;
        exception_from_row(row)
    }

    async fn count_fatal_subjects_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let rows = self
            .client
            .query(
                "SELECT COUNT(DISTINCT TRIM(nhs_number)) FROM exception_management \
                 WHERE is_fatal = TRUE AND date_created > $1 AND TRIM(nhs_number) <> ''",
                &[&since],
            )
            .await?;
        count_from_rows(&rows)
    }

    async fn exceptions_for_subject(
        &self,
        subject_key: &str,
    ) -> Result<Vec<ValidationExceptionLogEntry>> {
        let sql = format!(
            "SELECT {} FROM exception_management WHERE nhs_number = $1 \
             ORDER BY date_created, exception_id",
            EXCEPTION_COLUMNS
        );
        let rows = self.client.query(&sql, &[&subject_key]).await?;
        rows.iter().map(exception_from_row).collect()
    }

    async fn attach_ticket(&self, update: &TicketUpdate) -> Result<()> {
        let affected = self
            .client
            .execute(
                "UPDATE exception_management \
                 SET ticket_id = $2, ticket_created_at = $3, record_updated_at = NOW() \
                 WHERE exception_id = $1",
                &[
                    &update.exception_id,
                    &update.ticket_id,
                    &update.ticket_created_at,
                ],
            )
            .await?;

        if affected == 0 {
            return Err(StoreError::NotFound(format!("exception {}", update.exception_id)).into());
        }
        Ok(())
    }
}

#[async_trait]
impl InboundMetricStore for PostgreSQLAdapter {
    async fn append_metric(&self, metric: &InboundMetric) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO inbound_metric \
                 (metric_audit_id, process_name, received_date_time, source, record_count) \
                 VALUES ($1, $2, $3, $4, $5)",
                &[
                    &metric.metric_audit_id,
                    &metric.process_name,
                    &metric.received_date_time,
                    &metric.source,
                    &metric.record_count,
                ],
            )
            .await?;
        Ok(())
    }

    async fn sum_record_count_since(
        &self,
        process_name: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let rows = self
            .client
            .query(
                "SELECT COALESCE(SUM(record_count), 0)::BIGINT FROM inbound_metric \
                 WHERE process_name = $1 AND received_date_time > $2",
                &[&process_name, &since],
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| StoreError::Decode("SUM returned no row".to_string()))?;
        row.try_get(0)
            .map_err(|e| StoreError::Decode(format!("sum: {}", e)).into())
    }
}

#[async_trait]
impl StateStorage for PostgreSQLAdapter {
    async fn load_cursor(&self, name: &str) -> Result<Option<RunCursor>> {
        tracing::debug!(cursor = name, "Loading run cursor from PostgreSQL");

        let rows = self
            .client
            .query(
                "SELECT name, last_run, last_started_at, last_completed_at, last_status, \
                 runs_completed FROM reconciliation_state WHERE name = $1",
                &[&name],
            )
            .await?;

        match rows.first() {
            Some(row) => Ok(Some(PostgreSQLRunCursor::from_row(row)?.to_domain())),
            None => Ok(None),
        }
    }

    async fn save_cursor(&self, cursor: &RunCursor, dry_run: bool) -> Result<()> {
        if dry_run {
            tracing::info!(
                cursor = %cursor.name,
                last_run = %cursor.last_run,
                "DRY RUN: Would save run cursor to PostgreSQL"
            );
            return Ok(());
        }

        let pg_cursor = PostgreSQLRunCursor::from_domain(cursor);

        let upsert_query = r#"
            INSERT INTO reconciliation_state (
                name, last_run, last_started_at, last_completed_at, last_status, runs_completed
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO UPDATE SET
                last_run = EXCLUDED.last_run,
                last_started_at = EXCLUDED.last_started_at,
                last_completed_at = EXCLUDED.last_completed_at,
                last_status = EXCLUDED.last_status,
                runs_completed = EXCLUDED.runs_completed
        "#;

        self.client
            .execute(
                upsert_query,
                &[
                    &pg_cursor.name,
                    &pg_cursor.last_run,
                    &pg_cursor.last_started_at,
                    &pg_cursor.last_completed_at,
                    &pg_cursor.last_status,
                    &pg_cursor.runs_completed,
                ],
            )
            .await?;

        tracing::debug!(cursor = %cursor.name, "Run cursor saved to PostgreSQL");
        Ok(())
    }
}
