//! Validation pipeline
//!
//! Validates one candidate record against the rule registry and routes it:
//! fatal violations go only to the exception log, everything else is
//! committed to the distribution store (with its exception flag set when
//! non-fatal rules fired).

use super::summary::{IngestionFailure, IngestionSummary};
use crate::adapters::database::{CohortDistributionStore, Stores};
use crate::config::IngestionConfig;
use crate::core::exceptions::ExceptionRecorder;
use crate::core::validation::{RuleValidator, ValidationOutcome};
use crate::domain::{
    CohortDistributionRecord, CohortError, ExceptionContext, NhsNumber, Participant, Result,
};
use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// One candidate record plus the file it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub participant: Participant,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl ValidationRequest {
    pub fn new(participant: Participant, file_name: Option<String>) -> Self {
        Self {
            participant,
            file_name,
        }
    }
}

/// Response body of the validation endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub is_fatal: bool,
    pub created_exception: bool,
}

/// What happened to one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationDisposition {
    /// No rule fired; committed
    Committed(CohortDistributionRecord),
    /// Only non-fatal rules fired; committed with the exception flag set
    CommittedWithExceptions {
        record: CohortDistributionRecord,
        exceptions: usize,
    },
    /// A fatal rule fired; nothing committed
    Rejected { exceptions: usize },
}

impl ValidationDisposition {
    pub fn response(&self) -> ValidationResponse {
        match self {
            ValidationDisposition::Committed(_) => ValidationResponse {
                is_fatal: false,
                created_exception: false,
            },
            ValidationDisposition::CommittedWithExceptions { .. } => ValidationResponse {
                is_fatal: false,
                created_exception: true,
            },
            ValidationDisposition::Rejected { .. } => ValidationResponse {
                is_fatal: true,
                created_exception: true,
            },
        }
    }

    /// 200 when clean, 201 when an exception entry was created
    pub fn status_code(&self) -> u16 {
        if self.response().created_exception {
            201
        } else {
            200
        }
    }
}

/// A processing error, and whether the record was committed before it
struct ProcessFailure {
    error: CohortError,
    committed: bool,
}

impl From<CohortError> for ProcessFailure {
    fn from(error: CohortError) -> Self {
        Self {
            error,
            committed: false,
        }
    }
}

/// Wires the validator, exception log and distribution store together
#[derive(Clone)]
pub struct ValidationPipeline {
    records: Arc<dyn CohortDistributionStore + Send + Sync>,
    recorder: ExceptionRecorder,
    validator: RuleValidator,
    max_concurrency: usize,
    today: Option<NaiveDate>,
}

impl ValidationPipeline {
    pub fn new(stores: &Stores, config: &IngestionConfig) -> Self {
        Self {
            records: stores.records.clone(),
            recorder: ExceptionRecorder::new(stores.exceptions.clone())
                .with_cohort_name(config.cohort_name.clone()),
            validator: RuleValidator::new(),
            max_concurrency: config.max_concurrency.max(1),
            today: None,
        }
    }

    /// Replace the rule validator
    pub fn with_validator(mut self, validator: RuleValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Pin the reference date used by the date rules
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn recorder(&self) -> &ExceptionRecorder {
        &self.recorder
    }

    /// Validate one candidate and commit or reject it
    ///
    /// # Errors
    ///
    /// Returns `CohortError::RuleEvaluation` when a rule failed internally and
    /// a store error when a lookup or write failed. In both cases a system
    /// exception has already been written, best effort. If the record had
    /// already been committed that entry is non-fatal, so the subject is not
    /// counted as both inserted and rejected.
    pub async fn validate(&self, request: ValidationRequest) -> Result<ValidationDisposition> {
        match self.process(&request).await {
            Ok(disposition) => Ok(disposition),
            Err(ProcessFailure { error, committed }) => {
                if !matches!(error, CohortError::RuleEvaluation { .. }) {
                    let mut context = system_context(&request, &error);
                    if committed {
                        context = context.committed();
                    }
                    self.recorder.try_record_system_exception(&context).await;
                }
                Err(error)
            }
        }
    }

    async fn process(
        &self,
        request: &ValidationRequest,
    ) -> std::result::Result<ValidationDisposition, ProcessFailure> {
        let candidate = &request.participant;
        let file_name = request.file_name.as_deref();

        let prior = match NhsNumber::new(candidate.nhs_number.as_str()) {
            Ok(nhs_number) => self.records.latest_for_subject(&nhs_number).await?,
            Err(_) => None,
        };

        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let outcome = self
            .validator
            .validate_at(candidate, prior.as_ref(), today);

        if let Some(failure) = outcome.internal_errors.first() {
            self.recorder
                .record_violations(candidate, file_name, outcome.fatal())
                .await?;
            return Err(CohortError::RuleEvaluation {
                rule_id: failure.rule_id,
                message: failure.message.clone(),
            }
            .into());
        }

        if !outcome.passed {
            let written = self
                .recorder
                .record_violations(candidate, file_name, outcome.fatal())
                .await?;
            tracing::info!(
                nhs_number = %crate::domain::ids::mask(candidate.nhs_number.trim()),
                file_name = ?file_name,
                fatal = written.len(),
                "Record rejected by fatal rule"
            );
            return Ok(ValidationDisposition::Rejected {
                exceptions: written.len(),
            });
        }

        self.commit(candidate, file_name, &outcome).await
    }

    async fn commit(
        &self,
        candidate: &Participant,
        file_name: Option<&str>,
        outcome: &ValidationOutcome,
    ) -> std::result::Result<ValidationDisposition, ProcessFailure> {
        let nhs_number =
            NhsNumber::new(candidate.nhs_number.as_str()).map_err(CohortError::Validation)?;
        let flagged = outcome.has_violations();

        let record = CohortDistributionRecord::from_participant(
            candidate,
            nhs_number,
            flagged,
            Utc::now(),
        );
        let stored = self.records.insert_record(record).await?;

        tracing::debug!(
            cohort_distribution_id = stored.cohort_distribution_id,
            nhs_number = %stored.nhs_number.masked(),
            exception_flag = flagged,
            "Record committed"
        );

        if !flagged {
            return Ok(ValidationDisposition::Committed(stored));
        }

        let written = self
            .recorder
            .record_violations(candidate, file_name, outcome.non_fatal())
            .await
            .map_err(|error| ProcessFailure {
                error,
                committed: true,
            })?;

        Ok(ValidationDisposition::CommittedWithExceptions {
            record: stored,
            exceptions: written.len(),
        })
    }

    /// Validate a whole file's worth of candidates
    ///
    /// Candidates for the same subject run one after another in file order,
    /// so an ADD followed by an AMENDED sees its own prior version. Different
    /// subjects run concurrently, up to `max_concurrency` at a time. A failed
    /// candidate is counted and the rest carry on.
    pub async fn ingest_all(&self, requests: Vec<ValidationRequest>) -> IngestionSummary {
        let start = Instant::now();
        let mut summary = IngestionSummary::new();
        summary.total = requests.len();

        let groups = group_by_subject(requests);
        let results: Vec<Vec<(ValidationRequest, Result<ValidationDisposition>)>> =
            stream::iter(groups)
                .map(|group| async move {
                    let mut results = Vec::with_capacity(group.len());
                    for request in group {
                        let result = self.validate(request.clone()).await;
                        results.push((request, result));
                    }
                    results
                })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;

        for (request, result) in results.into_iter().flatten() {
            match result {
                Ok(ValidationDisposition::Committed(_)) => summary.committed += 1,
                Ok(ValidationDisposition::CommittedWithExceptions { exceptions, .. }) => {
                    summary.committed_with_exceptions += 1;
                    summary.exceptions_logged += exceptions;
                }
                Ok(ValidationDisposition::Rejected { exceptions }) => {
                    summary.rejected += 1;
                    summary.exceptions_logged += exceptions;
                }
                Err(err) => summary.add_failure(IngestionFailure::new(&request, &err)),
            }
        }

        summary.with_duration(start.elapsed())
    }
}

fn system_context(request: &ValidationRequest, err: &CohortError) -> ExceptionContext {
    let candidate = &request.participant;
    let mut context = ExceptionContext::new(err.to_string())
        .with_nhs_number(candidate.nhs_number.as_str());
    if let Some(file_name) = &request.file_name {
        context = context.with_file_name(file_name.as_str());
    }
    if let Some(screening_name) = &candidate.screening_name {
        context = context.with_screening_name(screening_name.as_str());
    }
    if let Ok(record) = serde_json::to_string(candidate) {
        context = context.with_error_record(record);
    }
    context
}

fn group_by_subject(requests: Vec<ValidationRequest>) -> Vec<Vec<ValidationRequest>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<ValidationRequest>> = Vec::new();

    for request in requests {
        let key = request.participant.nhs_number.trim().to_string();
        match index.get(&key) {
            Some(&i) => groups[i].push(request),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![request]);
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::ExceptionLog;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::{
        Demographics, RecordType, StoreError, TicketUpdate, ValidationExceptionLogEntry,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Exception log whose first append fails
    struct FlakyLog {
        inner: Arc<InMemoryStore>,
        failed: AtomicBool,
    }

    #[async_trait]
    impl ExceptionLog for FlakyLog {
        async fn append_exception(
            &self,
            entry: ValidationExceptionLogEntry,
        ) -> Result<ValidationExceptionLogEntry> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(StoreError::InsertFailed("exception log unavailable".to_string()).into());
            }
            self.inner.append_exception(entry).await
        }

        async fn count_fatal_subjects_since(&self, since: DateTime<Utc>) -> Result<u64> {
            self.inner.count_fatal_subjects_since(since).await
        }

        async fn exceptions_for_subject(
            &self,
            subject_key: &str,
        ) -> Result<Vec<ValidationExceptionLogEntry>> {
            self.inner.exceptions_for_subject(subject_key).await
        }

        async fn attach_ticket(&self, update: &TicketUpdate) -> Result<()> {
            self.inner.attach_ticket(update).await
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn pipeline(store: Arc<InMemoryStore>) -> ValidationPipeline {
        ValidationPipeline::new(&Stores::from_adapter(store), &IngestionConfig::default())
            .with_today(today())
    }

    fn request(nhs_number: &str, record_type: RecordType) -> ValidationRequest {
        let participant = Participant::builder()
            .nhs_number(nhs_number)
            .record_type(record_type)
            .demographics(Demographics {
                primary_care_provider: Some("A81001".to_string()),
                given_name: Some("Jane".to_string()),
                family_name: Some("Smith".to_string()),
                date_of_birth: Some("19700101".to_string()),
                gender: Some(2),
                address_line1: Some("1 High Street".to_string()),
                postcode: Some("LS1 4AP".to_string()),
                ..Demographics::default()
            })
            .build()
            .unwrap();
        ValidationRequest::new(participant, Some("BSS_20240615.json".to_string()))
    }

    #[tokio::test]
    async fn test_clean_record_is_committed() {
        let store = Arc::new(InMemoryStore::new());
        let disposition = pipeline(store.clone())
            .validate(request("9434765919", RecordType::Add))
            .await
            .unwrap();

        assert_eq!(disposition.status_code(), 200);
        assert!(matches!(disposition, ValidationDisposition::Committed(ref r) if !r.exception_flag));
        assert_eq!(store.all_records().await.len(), 1);
        assert!(store.all_exceptions().await.is_empty());
    }

    #[test]
    fn test_group_by_subject_keeps_file_order() {
        let groups = group_by_subject(vec![
            request("9434765919", RecordType::Add),
            request("9434765870", RecordType::Add),
            request(" 9434765919", RecordType::Amended),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(
            groups[0][1].participant.parsed_record_type(),
            Some(RecordType::Amended)
        );
    }

    #[tokio::test]
    async fn test_ingest_all_sees_prior_version_within_file() {
        let store = Arc::new(InMemoryStore::new());
        let summary = pipeline(store.clone())
            .ingest_all(vec![
                request("9434765919", RecordType::Add),
                request("9434765919", RecordType::Amended),
                request("9434765870", RecordType::Amended),
            ])
            .await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.committed, 2);
        // The AMENDED for 9434765870 has nothing to amend
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.failed, 0);

        let exceptions = store.exceptions_for_subject("9434765870").await.unwrap();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].rule_id, 22);
    }

    #[tokio::test]
    async fn test_failed_exception_write_after_commit_is_not_fatal() {
        let store = Arc::new(InMemoryStore::new());
        let mut stores = Stores::from_adapter(store.clone());
        stores.exceptions = Arc::new(FlakyLog {
            inner: store.clone(),
            failed: AtomicBool::new(false),
        });
        let since = Utc::now() - Duration::hours(1);
        let pipeline =
            ValidationPipeline::new(&stores, &IngestionConfig::default()).with_today(today());

        let mut flagged = request("9434765919", RecordType::Add);
        flagged.participant.demographics.given_name = None;
        let result = pipeline.validate(flagged).await;

        assert!(result.is_err());
        let records = store.all_records().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].exception_flag);

        let exceptions = store.all_exceptions().await;
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].rule_id, 0);
        assert!(!exceptions[0].is_fatal);
        assert_eq!(store.count_fatal_subjects_since(since).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_before_commit_is_fatal() {
        let store = Arc::new(InMemoryStore::new());
        let mut stores = Stores::from_adapter(store.clone());
        stores.exceptions = Arc::new(FlakyLog {
            inner: store.clone(),
            failed: AtomicBool::new(false),
        });
        let pipeline =
            ValidationPipeline::new(&stores, &IngestionConfig::default()).with_today(today());

        // Rule 22: AMENDED with nothing to amend is fatal
        let result = pipeline
            .validate(request("9434765919", RecordType::Amended))
            .await;

        assert!(result.is_err());
        assert!(store.all_records().await.is_empty());
        let exceptions = store.all_exceptions().await;
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].rule_id, 0);
        assert!(exceptions[0].is_fatal);
    }
}
