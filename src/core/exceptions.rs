//! Exception recorder
//!
//! Turns rule violations and unexpected failures into exception log
//! entries. Every entry written here is also logged with a masked subject key.

use crate::adapters::database::ExceptionLog;
use crate::core::validation::{Violation, INTERNAL_ERROR_RULE_ID};
use crate::domain::{
    ExceptionCategory, ExceptionContext, Participant, Result, ValidationExceptionLogEntry,
};
use std::sync::Arc;

/// Description used for system exceptions
pub const SYSTEM_EXCEPTION_DESCRIPTION: &str = "0.SystemException.Fatal";

/// Description used when the record had already been committed
pub const COMMITTED_SYSTEM_EXCEPTION_DESCRIPTION: &str = "0.SystemException.NonFatal";

/// Writes exception log entries
#[derive(Clone)]
pub struct ExceptionRecorder {
    log: Arc<dyn ExceptionLog + Send + Sync>,
    cohort_name: Option<String>,
}

impl ExceptionRecorder {
    pub fn new(log: Arc<dyn ExceptionLog + Send + Sync>) -> Self {
        Self {
            log,
            cohort_name: None,
        }
    }

    /// Stamp every entry with the cohort it was raised for
    pub fn with_cohort_name(mut self, cohort_name: Option<String>) -> Self {
        self.cohort_name = cohort_name;
        self
    }

    /// Write one validation entry per violation
    ///
    /// The candidate is serialized into `error_record` so the failure can be
    /// replayed once fixed. Entries are written in the order given.
    ///
    /// # Errors
    ///
    /// Returns the first store error; entries written before it stay written.
    pub async fn record_violations<'a, I>(
        &self,
        candidate: &Participant,
        file_name: Option<&str>,
        violations: I,
    ) -> Result<Vec<ValidationExceptionLogEntry>>
    where
        I: IntoIterator<Item = &'a Violation>,
    {
        let error_record = serde_json::to_string(candidate).ok();
        let subject_key = candidate.nhs_number.trim();
        let mut written = Vec::new();

        for violation in violations {
            let category = if violation.rule_id == INTERNAL_ERROR_RULE_ID {
                ExceptionCategory::System
            } else {
                ExceptionCategory::Validation
            };

            let mut entry = ValidationExceptionLogEntry::new(
                violation.rule_id,
                violation.description.clone(),
                subject_key,
                violation.is_fatal,
                category,
            )
            .with_file_name(file_name.map(str::to_string))
            .with_error_record(error_record.clone())
            .with_screening_name(candidate.screening_name.clone());
            entry.cohort_name = self.cohort_name.clone();

            let stored = self.log.append_exception(entry).await?;
            crate::log_exception_logged!(
                stored.rule_id,
                &stored.subject_key,
                stored.file_name.as_deref(),
                stored.is_fatal
            );
            written.push(stored);
        }

        Ok(written)
    }

    /// Write a system exception for an unexpected failure
    ///
    /// Fatal unless the context says the record was already committed; a
    /// fatal entry always means the subject's record was not persisted.
    pub async fn record_system_exception(
        &self,
        context: &ExceptionContext,
    ) -> Result<ValidationExceptionLogEntry> {
        let (description, is_fatal) = if context.record_committed {
            (COMMITTED_SYSTEM_EXCEPTION_DESCRIPTION, false)
        } else {
            (SYSTEM_EXCEPTION_DESCRIPTION, true)
        };

        let mut entry = ValidationExceptionLogEntry::new(
            INTERNAL_ERROR_RULE_ID,
            description,
            context.nhs_number.as_deref().map(str::trim).unwrap_or_default(),
            is_fatal,
            ExceptionCategory::System,
        )
        .with_file_name(context.file_name.clone())
        .with_error_record(
            context
                .error_record
                .clone()
                .or_else(|| Some(context.message.clone())),
        )
        .with_screening_name(context.screening_name.clone());
        entry.cohort_name = self.cohort_name.clone();

        tracing::error!(
            file_name = ?context.file_name,
            message = %context.message,
            "Recording system exception"
        );

        let stored = self.log.append_exception(entry).await?;
        crate::log_exception_logged!(
            stored.rule_id,
            &stored.subject_key,
            stored.file_name.as_deref(),
            stored.is_fatal
        );
        Ok(stored)
    }

    /// Like [`record_system_exception`], but only logs if the write fails
    ///
    /// Used on paths that are already returning an error to their caller.
    ///
    /// [`record_system_exception`]: ExceptionRecorder::record_system_exception
    pub async fn try_record_system_exception(&self, context: &ExceptionContext) {
        if let Err(err) = self.record_system_exception(context).await {
            crate::log_error_with_context!(&err, "Failed to write system exception");
        }
    }
}
