//! Logging and observability
//!
//! Structured logging over `tracing`, with a console layer and an optional
//! rolling JSON file. The macros below cover events that are logged from
//! more than one place, so their field names stay consistent.
//!
//! # Example
//!
//! ```no_run
//! use cohort::logging::init_logging;
//! use cohort::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log an extraction batch handed out to the consumer
///
/// # Example
///
/// ```no_run
/// use cohort::log_extraction_served;
/// use cohort::domain::RequestId;
///
/// let request_id = RequestId::generate();
/// log_extraction_served!(&request_id, 100, 42, false);
/// ```
#[macro_export]
macro_rules! log_extraction_served {
    ($request_id:expr, $row_count:expr, $records:expr, $replay:expr) => {
        tracing::info!(
            request_id = %$request_id,
            row_count = $row_count,
            records = $records,
            replay = $replay,
            "Extraction batch served"
        );
    };
}

/// Log an exception log entry that was written
///
/// The subject key is masked before it is logged.
///
/// # Example
///
/// ```no_run
/// use cohort::log_exception_logged;
///
/// log_exception_logged!(9, "9434765919", Some("BSS_20241225.json"), true);
/// ```
#[macro_export]
macro_rules! log_exception_logged {
    ($rule_id:expr, $subject_key:expr, $file_name:expr, $is_fatal:expr) => {
        tracing::info!(
            rule_id = $rule_id,
            nhs_number = %$crate::domain::ids::mask($subject_key),
            file_name = ?$file_name,
            is_fatal = $is_fatal,
            "Exception logged"
        );
    };
}

/// Log a reconciliation result; mismatches are logged at critical severity
///
/// # Example
///
/// ```no_run
/// use cohort::log_reconciliation_result;
///
/// log_reconciliation_result!(15, 15);
/// ```
#[macro_export]
macro_rules! log_reconciliation_result {
    ($expected:expr, $processed:expr) => {
        if $expected == $processed {
            tracing::info!(
                expected = $expected,
                processed = $processed,
                "Reconciliation matched"
            );
        } else {
            tracing::error!(
                severity = "critical",
                expected = $expected,
                processed = $processed,
                "Reconciliation mismatch: records may have been lost"
            );
        }
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use cohort::log_error_with_context;
/// use cohort::domain::CohortError;
///
/// let error = CohortError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use cohort::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "claim_records");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = $reason,
            "Retrying operation"
        );
    };
}
