//! Domain error types
//!
//! This module defines the error hierarchy for the cohort pipeline.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main cohort error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum CohortError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Extraction request errors
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Malformed input that is not a rule violation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A business rule raised an unexpected error while being evaluated
    #[error("Rule {rule_id} failed to evaluate: {message}")]
    RuleEvaluation { rule_id: u16, message: String },

    /// Reconciliation cursor errors
    #[error("State management error: {0}")]
    State(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl CohortError {
    /// Returns true when the error was caused by the caller's input
    ///
    /// Client errors map to a 4xx response and are never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(self, CohortError::Extraction(_) | CohortError::Validation(_))
    }

    /// Returns true when the failure came from a dependency and a later
    /// attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            CohortError::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Store-specific errors
///
/// Errors raised by any of the persistent stores (distribution records,
/// request audit, exception log, inbound metrics, run state).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to obtain a connection
    #[error("Failed to connect to store: {0}")]
    ConnectionFailed(String),

    /// Read failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Insert failed
    #[error("Insert failed: {0}")]
    InsertFailed(String),

    /// Update failed
    #[error("Update failed: {0}")]
    UpdateFailed(String),

    /// Unique key already present
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Statement or pool timeout
    #[error("Store timeout: {0}")]
    Timeout(String),

    /// Failed to map a row into a domain type
    #[error("Failed to decode row: {0}")]
    Decode(String),
}

impl StoreError {
    /// Transient errors are worth retrying on the next delivery or tick
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed(_)
                | StoreError::Timeout(_)
                | StoreError::QueryFailed(_)
                | StoreError::InsertFailed(_)
                | StoreError::UpdateFailed(_)
        )
    }
}

/// Extraction request errors
///
/// Every variant is a client error: the request is rejected before or
/// instead of mutating any store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// rowCount missing or not a number
    #[error("rowCount must be a number, got '{0}'")]
    InvalidRowCount(String),

    /// rowCount zero or negative
    #[error("rowCount must be greater than zero, got {0}")]
    NonPositiveRowCount(i64),

    /// requestId is not a valid identifier
    #[error("requestId is not a valid identifier: '{0}'")]
    MalformedRequestId(String),

    /// requestId was never issued
    #[error("requestId not found in the request audit: {0}")]
    UnknownRequestId(String),

    /// Query filter was not acceptable
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
}

/// Context attached to a system exception
///
/// Carries whatever is known about the record being processed when an
/// unexpected failure happened, so the failure can be traced and replayed.
#[derive(Debug, Clone, Default)]
pub struct ExceptionContext {
    /// Subject key (NHS number) of the record, if known
    pub nhs_number: Option<String>,

    /// Originating file name, if known
    pub file_name: Option<String>,

    /// Screening service name, if known
    pub screening_name: Option<String>,

    /// Serialized record that was being processed
    pub error_record: Option<String>,

    /// Error message
    pub message: String,

    /// The record was committed before the failure
    pub record_committed: bool,
}

impl ExceptionContext {
    /// Creates a new exception context
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Sets the NHS number
    pub fn with_nhs_number(mut self, nhs_number: impl Into<String>) -> Self {
        self.nhs_number = Some(nhs_number.into());
        self
    }

    /// Sets the originating file name
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the screening name
    pub fn with_screening_name(mut self, screening_name: impl Into<String>) -> Self {
        self.screening_name = Some(screening_name.into());
        self
    }

    /// Sets the serialized record
    pub fn with_error_record(mut self, record: impl Into<String>) -> Self {
        self.error_record = Some(record.into());
        self
    }

    /// Marks the record as already committed
    pub fn committed(mut self) -> Self {
        self.record_committed = true;
        self
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for CohortError {
    fn from(err: std::io::Error) -> Self {
        CohortError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CohortError {
    fn from(err: serde_json::Error) -> Self {
        CohortError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CohortError {
    fn from(err: toml::de::Error) -> Self {
        CohortError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cohort_error_display() {
        let err = CohortError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_store_error_conversion() {
        let store_err = StoreError::Timeout("statement timeout".to_string());
        let err: CohortError = store_err.into();
        assert!(matches!(err, CohortError::Store(_)));
        assert!(err.is_transient());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_extraction_error_is_client_error() {
        let err: CohortError = ExtractionError::NonPositiveRowCount(0).into();
        assert!(err.is_client_error());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "Extraction error: rowCount must be greater than zero, got 0"
        );
    }

    #[test]
    fn test_duplicate_key_is_not_transient() {
        assert!(!StoreError::DuplicateKey("id".to_string()).is_transient());
        assert!(!StoreError::NotFound("id".to_string()).is_transient());
    }

    #[test]
    fn test_exception_context_builder() {
        let context = ExceptionContext::new("Store unavailable")
            .with_nhs_number("9876543210")
            .with_file_name("BSS_20241225.parquet")
            .with_screening_name("Breast Screening")
            .with_error_record("{}");

        assert_eq!(context.nhs_number.as_deref(), Some("9876543210"));
        assert_eq!(context.file_name.as_deref(), Some("BSS_20241225.parquet"));
        assert_eq!(context.screening_name.as_deref(), Some("Breast Screening"));
        assert_eq!(context.error_record.as_deref(), Some("{}"));
        assert_eq!(context.message, "Store unavailable");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: CohortError = io_err.into();
        assert!(matches!(err, CohortError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: CohortError = json_err.into();
        assert!(matches!(err, CohortError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: CohortError = toml_err.into();
        assert!(matches!(err, CohortError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_cohort_error_implements_std_error() {
        let err = CohortError::Validation("Test error".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
