//! PostgreSQL row models
//!
//! Column lists and the conversions between table rows and domain types.
//! Rows are decoded with `try_get` so a schema drift surfaces as
//! `StoreError::Decode` instead of a panic.

use crate::core::state::cursor::{RunCursor, RunStatus};
use crate::domain::{
    CohortDistributionRecord, DeathStatus, Demographics, ExceptionCategory, InboundMetric,
    NhsNumber, RequestAuditEntry, RequestId, Result, StoreError, ValidationExceptionLogEntry,
};
use chrono::{DateTime, Utc};
use tokio_postgres::types::FromSql;
use tokio_postgres::Row;
use uuid::Uuid;

/// Columns selected for every cohort distribution query
pub const RECORD_COLUMNS: &str = "cohort_distribution_id, participant_id, nhs_number, \
    superseded_nhs_number, screening_name, primary_care_provider, \
    primary_care_provider_effective_from_date, name_prefix, given_name, other_given_names, \
    family_name, previous_family_name, date_of_birth, gender, address_line1, address_line2, \
    address_line3, address_line4, address_line5, postcode, current_posting, \
    current_posting_effective_from_date, date_of_death, death_status, telephone_number_home, \
    telephone_number_mobile, email_address_home, preferred_language, interpreter_required, \
    reason_for_removal, reason_for_removal_effective_from_date, exception_flag, is_extracted, \
    request_id, record_insert_datetime, record_update_datetime";

/// Columns selected for every exception log query
pub const EXCEPTION_COLUMNS: &str = "exception_id, rule_id, rule_description, nhs_number, \
    file_name, is_fatal, category, error_record, screening_name, cohort_name, date_created, \
    date_resolved, ticket_id, ticket_created_at, record_updated_at";

fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T> {
    row.try_get(name)
        .map_err(|e| StoreError::Decode(format!("column {}: {}", name, e)).into())
}

fn nhs_column(row: &Row, name: &str) -> Result<Option<NhsNumber>> {
    let value: Option<String> = column(row, name)?;
    value
        .map(|v| NhsNumber::new(v).map_err(|e| StoreError::Decode(e).into()))
        .transpose()
}

pub fn death_status_to_sql(status: Option<DeathStatus>) -> Option<&'static str> {
    status.map(|s| match s {
        DeathStatus::Informal => "informal",
        DeathStatus::Formal => "formal",
    })
}

fn death_status_from_sql(value: Option<&str>) -> Option<DeathStatus> {
    match value {
        Some("informal") => Some(DeathStatus::Informal),
        Some("formal") => Some(DeathStatus::Formal),
        _ => None,
    }
}

/// Decode a `cohort_distribution` row selected with [`RECORD_COLUMNS`]
pub fn record_from_row(row: &Row) -> Result<CohortDistributionRecord> {
    let death_status: Option<String> = column(row, "death_status")?;
    let request_id: Option<Uuid> = column(row, "request_id")?;

    let demographics = Demographics {
        primary_care_provider: column(row, "primary_care_provider")?,
        primary_care_provider_effective_from_date: column(
            row,
            "primary_care_provider_effective_from_date",
        )?,
        name_prefix: column(row, "name_prefix")?,
        given_name: column(row, "given_name")?,
        other_given_names: column(row, "other_given_names")?,
        family_name: column(row, "family_name")?,
        previous_family_name: column(row, "previous_family_name")?,
        date_of_birth: column(row, "date_of_birth")?,
        gender: column(row, "gender")?,
        address_line1: column(row, "address_line1")?,
        address_line2: column(row, "address_line2")?,
        address_line3: column(row, "address_line3")?,
        address_line4: column(row, "address_line4")?,
        address_line5: column(row, "address_line5")?,
        postcode: column(row, "postcode")?,
        current_posting: column(row, "current_posting")?,
        current_posting_effective_from_date: column(row, "current_posting_effective_from_date")?,
        date_of_death: column(row, "date_of_death")?,
        death_status: death_status_from_sql(death_status.as_deref()),
        telephone_number_home: column(row, "telephone_number_home")?,
        telephone_number_mobile: column(row, "telephone_number_mobile")?,
        email_address_home: column(row, "email_address_home")?,
        preferred_language: column(row, "preferred_language")?,
        interpreter_required: column(row, "interpreter_required")?,
        reason_for_removal: column(row, "reason_for_removal")?,
        reason_for_removal_effective_from_date: column(
            row,
            "reason_for_removal_effective_from_date",
        )?,
    };

    let nhs_number = nhs_column(row, "nhs_number")?
        .ok_or_else(|| StoreError::Decode("column nhs_number: null".to_string()))?;

    Ok(CohortDistributionRecord {
        cohort_distribution_id: column(row, "cohort_distribution_id")?,
        participant_id: column(row, "participant_id")?,
        nhs_number,
        superseded_nhs_number: nhs_column(row, "superseded_nhs_number")?,
        screening_name: column(row, "screening_name")?,
        demographics,
        exception_flag: column(row, "exception_flag")?,
        is_extracted: column(row, "is_extracted")?,
        request_id: request_id.map(RequestId::from_uuid),
        record_insert_datetime: column(row, "record_insert_datetime")?,
        record_update_datetime: column(row, "record_update_datetime")?,
    })
}

/// Decode a `cohort_request_audit` row
pub fn audit_entry_from_row(row: &Row) -> Result<RequestAuditEntry> {
    let request_id: Uuid = column(row, "request_id")?;
    let status_code: i16 = column(row, "status_code")?;

    Ok(RequestAuditEntry {
        request_id: RequestId::from_uuid(request_id),
        status_code: u16::try_from(status_code)
            .map_err(|_| StoreError::Decode(format!("status_code {}", status_code)))?,
        created_at: column(row, "created_at")?,
        row_count_requested: column(row, "row_count_requested")?,
    })
}

/// Decode an `exception_management` row selected with [`EXCEPTION_COLUMNS`]
pub fn exception_from_row(row: &Row) -> Result<ValidationExceptionLogEntry> {
    let rule_id: i32 = column(row, "rule_id")?;
    let category: i16 = column(row, "category")?;

    Ok(ValidationExceptionLogEntry {
        exception_id: column(row, "exception_id")?,
        rule_id: u16::try_from(rule_id)
            .map_err(|_| StoreError::Decode(format!("rule_id {}", rule_id)))?,
        rule_description: column(row, "rule_description")?,
        subject_key: column(row, "nhs_number")?,
        file_name: column(row, "file_name")?,
        is_fatal: column(row, "is_fatal")?,
        category: ExceptionCategory::from_code(category)
            .ok_or_else(|| StoreError::Decode(format!("category {}", category)))?,
        error_record: column(row, "error_record")?,
        screening_name: column(row, "screening_name")?,
        cohort_name: column(row, "cohort_name")?,
        created_at: column(row, "date_created")?,
        date_resolved: column(row, "date_resolved")?,
        ticket_id: column(row, "ticket_id")?,
        ticket_created_at: column(row, "ticket_created_at")?,
        record_updated_at: column(row, "record_updated_at")?,
    })
}

/// Decode an `inbound_metric` row
pub fn metric_from_row(row: &Row) -> Result<InboundMetric> {
    Ok(InboundMetric {
        metric_audit_id: column(row, "metric_audit_id")?,
        process_name: column(row, "process_name")?,
        received_date_time: column(row, "received_date_time")?,
        source: column(row, "source")?,
        record_count: column(row, "record_count")?,
    })
}

/// Run cursor row for PostgreSQL storage
///
/// This structure maps to the `reconciliation_state` table.
#[derive(Debug, Clone, PartialEq)]
pub struct PostgreSQLRunCursor {
    pub name: String,
    pub last_run: DateTime<Utc>,
    pub last_started_at: DateTime<Utc>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub last_status: String,
    pub runs_completed: i64,
}

impl PostgreSQLRunCursor {
    /// Convert from the domain cursor
    pub fn from_domain(cursor: &RunCursor) -> Self {
        Self {
            name: cursor.name.clone(),
            last_run: cursor.last_run,
            last_started_at: cursor.last_started_at,
            last_completed_at: cursor.last_completed_at,
            last_status: cursor.last_status.as_str().to_string(),
            runs_completed: i64::try_from(cursor.runs_completed).unwrap_or(i64::MAX),
        }
    }

    /// Decode a `reconciliation_state` row
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            name: column(row, "name")?,
            last_run: column(row, "last_run")?,
            last_started_at: column(row, "last_started_at")?,
            last_completed_at: column(row, "last_completed_at")?,
            last_status: column(row, "last_status")?,
            runs_completed: column(row, "runs_completed")?,
        })
    }

    /// Convert to the domain cursor
    pub fn to_domain(&self) -> RunCursor {
        RunCursor {
            name: self.name.clone(),
            last_run: self.last_run,
            last_started_at: self.last_started_at,
            last_completed_at: self.last_completed_at,
            last_status: RunStatus::parse(&self.last_status),
            runs_completed: u64::try_from(self.runs_completed).unwrap_or(0),
        }
    }
}
