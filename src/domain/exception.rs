//! Exception log domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broad classification of an exception log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionCategory {
    /// A business rule fired
    Validation,
    /// An unexpected failure while processing a record
    System,
}

impl ExceptionCategory {
    /// Numeric code stored alongside the entry
    pub fn code(&self) -> i16 {
        match self {
            ExceptionCategory::Validation => 1,
            ExceptionCategory::System => 99,
        }
    }

    /// Inverse of [`ExceptionCategory::code`]
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(ExceptionCategory::Validation),
            99 => Some(ExceptionCategory::System),
            _ => None,
        }
    }
}

/// One entry in the exception log
///
/// Fatal entries belong to records that were not committed for that
/// ingestion attempt; non-fatal entries belong to committed records whose
/// exception flag is set. Ticket fields are filled in later, out of band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationExceptionLogEntry {
    /// Surrogate id assigned by the store
    pub exception_id: i64,
    pub rule_id: u16,
    pub rule_description: String,
    /// Raw subject key; may be blank for system exceptions
    pub subject_key: String,
    pub file_name: Option<String>,
    pub is_fatal: bool,
    pub category: ExceptionCategory,
    pub error_record: Option<String>,
    pub screening_name: Option<String>,
    pub cohort_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub date_resolved: Option<DateTime<Utc>>,
    pub ticket_id: Option<String>,
    pub ticket_created_at: Option<DateTime<Utc>>,
    pub record_updated_at: Option<DateTime<Utc>>,
}

impl ValidationExceptionLogEntry {
    /// Creates a new, unstored entry
    pub fn new(
        rule_id: u16,
        rule_description: impl Into<String>,
        subject_key: impl Into<String>,
        is_fatal: bool,
        category: ExceptionCategory,
    ) -> Self {
        Self {
            exception_id: 0,
            rule_id,
            rule_description: rule_description.into(),
            subject_key: subject_key.into(),
            file_name: None,
            is_fatal,
            category,
            error_record: None,
            screening_name: None,
            cohort_name: None,
            created_at: Utc::now(),
            date_resolved: None,
            ticket_id: None,
            ticket_created_at: None,
            record_updated_at: None,
        }
    }

    /// Sets the originating file name
    pub fn with_file_name(mut self, file_name: Option<String>) -> Self {
        self.file_name = file_name;
        self
    }

    /// Sets the serialized record
    pub fn with_error_record(mut self, error_record: Option<String>) -> Self {
        self.error_record = error_record;
        self
    }

    /// Sets the screening name
    pub fn with_screening_name(mut self, screening_name: Option<String>) -> Self {
        self.screening_name = screening_name;
        self
    }
}

/// Out-of-band ticket reference attached to an existing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdate {
    pub exception_id: i64,
    pub ticket_id: String,
    pub ticket_created_at: DateTime<Utc>,
}
