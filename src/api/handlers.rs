//! Endpoint handlers
//!
//! Each handler takes already-decoded request parameters and returns an
//! [`ApiResponse`]. Handlers never return errors: client errors become 400s
//! and anything else becomes a 500, with a system exception written where
//! a record or request was being processed.

use super::responses::{ApiResponse, ExtractionResponse};
use crate::adapters::database::Stores;
use crate::config::CohortConfig;
use crate::core::exceptions::ExceptionRecorder;
use crate::core::extraction::{AuditQueryParams, AuditService, BatchExtractor};
use crate::core::ingestion::{
    InboundMetricHandler, MetricDisposition, ValidationPipeline, ValidationRequest,
};
use crate::domain::{CohortError, ExceptionContext, ExtractionError, RequestId};

/// All endpoints over one set of stores
#[derive(Clone)]
pub struct CohortApi {
    extractor: BatchExtractor,
    pipeline: ValidationPipeline,
    audit: AuditService,
    metrics: InboundMetricHandler,
    recorder: ExceptionRecorder,
}

impl CohortApi {
    pub fn new(stores: &Stores, config: &CohortConfig) -> Self {
        let pipeline = ValidationPipeline::new(stores, &config.ingestion);
        Self {
            extractor: BatchExtractor::new(stores, &config.extraction),
            recorder: pipeline.recorder().clone(),
            pipeline,
            audit: AuditService::new(stores.audit.clone()),
            metrics: InboundMetricHandler::new(stores.metrics.clone()),
        }
    }

    /// Replace the extractor, e.g. to inject a retry policy
    pub fn with_extractor(mut self, extractor: BatchExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the validation pipeline, e.g. to pin its reference date
    pub fn with_pipeline(mut self, pipeline: ValidationPipeline) -> Self {
        self.recorder = pipeline.recorder().clone();
        self.pipeline = pipeline;
        self
    }

    /// Extraction endpoint
    ///
    /// 200 with the batch, 204 when nothing is available, 400 for bad
    /// parameters or an unknown request id, 500 on store failure.
    pub async fn extract(&self, row_count: Option<&str>, request_id: Option<&str>) -> ApiResponse {
        match self.extractor.extract_raw(row_count, request_id).await {
            Ok(batch) if batch.is_empty() => ApiResponse::no_content(),
            Ok(batch) => ApiResponse::ok(&ExtractionResponse {
                request_id: batch.request_id,
                records: &batch.records,
            }),
            Err(err) => {
                if !err.is_client_error() {
                    crate::log_error_with_context!(&err, "Extraction failed");
                    let context = ExceptionContext::new(format!("Extraction failed: {}", err));
                    self.recorder.try_record_system_exception(&context).await;
                }
                ApiResponse::from_error(&err)
            }
        }
    }

    /// Validation endpoint
    ///
    /// 200 when no exception was created, 201 with `{isFatal,
    /// createdException: true}` when one was, 400 for a record with no
    /// subject key, 500 when processing failed.
    pub async fn validate(&self, request: ValidationRequest) -> ApiResponse {
        if request.participant.nhs_number.trim().is_empty() {
            return ApiResponse::bad_request("nhsNumber is required");
        }

        match self.pipeline.validate(request).await {
            Ok(disposition) => {
                ApiResponse::with_body(disposition.status_code(), &disposition.response())
            }
            Err(err) => {
                crate::log_error_with_context!(&err, "Validation failed");
                ApiResponse::from_error(&err)
            }
        }
    }

    /// Request audit query endpoint
    ///
    /// 200 with entries ordered by creation time, 204 when none match, 400
    /// for a bad filter.
    pub async fn retrieve_audit(&self, params: &AuditQueryParams) -> ApiResponse {
        let query = match params.parse() {
            Ok(query) => query,
            Err(err) => return ApiResponse::from_error(&CohortError::from(err)),
        };

        match self.audit.retrieve(&query).await {
            Ok(entries) if entries.is_empty() => ApiResponse::no_content(),
            Ok(entries) => ApiResponse::ok(&entries),
            Err(err) => {
                crate::log_error_with_context!(&err, "Request audit query failed");
                ApiResponse::from_error(&err)
            }
        }
    }

    /// Outstanding requests endpoint
    ///
    /// Entries created after `last_request_id`; 204 when there are none,
    /// 400 when the id is missing, malformed or unknown.
    pub async fn outstanding_requests(&self, last_request_id: Option<&str>) -> ApiResponse {
        let raw = last_request_id.map(str::trim).unwrap_or_default();
        let request_id = match raw.parse::<RequestId>() {
            Ok(id) => id,
            Err(_) => {
                let err = CohortError::from(ExtractionError::MalformedRequestId(raw.to_string()));
                return ApiResponse::from_error(&err);
            }
        };

        match self.audit.outstanding(request_id).await {
            Ok(entries) if entries.is_empty() => ApiResponse::no_content(),
            Ok(entries) => ApiResponse::ok(&entries),
            Err(err) => {
                if !err.is_client_error() {
                    crate::log_error_with_context!(&err, "Outstanding request query failed");
                }
                ApiResponse::from_error(&err)
            }
        }
    }

    /// Inbound metric consumer
    pub async fn inbound_metric(&self, payload: &str) -> MetricDisposition {
        self.metrics.handle_payload(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::CohortDistributionStore;
    use crate::adapters::memory::InMemoryStore;
    use crate::core::exceptions::SYSTEM_EXCEPTION_DESCRIPTION;
    use crate::core::validation::{RuleContext, RuleError, RuleValidator, Severity};
    use crate::core::validation::rules::{Rule, INTERNAL_ERROR_DESCRIPTION};
    use crate::domain::{
        CohortDistributionRecord, ExceptionCategory, NhsNumber, Participant, Result, StoreError,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    /// Record store that cannot be reached
    struct UnreachableRecords;

    fn connection_refused<T>() -> Result<T> {
        Err(StoreError::ConnectionFailed("connection refused".to_string()).into())
    }

    #[async_trait]
    impl CohortDistributionStore for UnreachableRecords {
        async fn insert_record(
            &self,
            _record: CohortDistributionRecord,
        ) -> Result<CohortDistributionRecord> {
            connection_refused()
        }

        async fn latest_for_subject(
            &self,
            _nhs_number: &NhsNumber,
        ) -> Result<Option<CohortDistributionRecord>> {
            connection_refused()
        }

        async fn select_unextracted(
            &self,
            _row_count: usize,
        ) -> Result<Vec<CohortDistributionRecord>> {
            connection_refused()
        }

        async fn claim_records(
            &self,
            _request_id: RequestId,
            _ids: &[i64],
        ) -> Result<Vec<CohortDistributionRecord>> {
            connection_refused()
        }

        async fn records_for_request(
            &self,
            _request_id: RequestId,
        ) -> Result<Vec<CohortDistributionRecord>> {
            connection_refused()
        }

        async fn count_inserted_since(&self, _since: DateTime<Utc>) -> Result<u64> {
            connection_refused()
        }
    }

    fn unreachable_api() -> (CohortApi, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let mut stores = Stores::from_adapter(store.clone());
        stores.records = Arc::new(UnreachableRecords);
        (CohortApi::new(&stores, &CohortConfig::in_memory()), store)
    }

    fn valid_add() -> ValidationRequest {
        let participant = Participant::builder()
            .nhs_number("9434765919")
            .raw_record_type("ADD")
            .build()
            .unwrap();
        ValidationRequest::new(participant, Some("BSS.json".to_string()))
    }

    fn always_errors(_ctx: &RuleContext<'_>) -> std::result::Result<bool, RuleError> {
        Err(RuleError("reference data missing".to_string()))
    }

    static BROKEN_RULES: [Rule; 1] = [Rule::new(
        5,
        "Broken",
        Severity::NonFatal,
        false,
        always_errors,
    )];

    fn api() -> (CohortApi, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let api = CohortApi::new(&Stores::from_adapter(store.clone()), &CohortConfig::in_memory());
        (api, store)
    }

    #[tokio::test]
    async fn test_extract_bad_row_count_is_400() {
        let (api, store) = api();
        assert_eq!(api.extract(Some("0"), None).await.status, 400);
        assert_eq!(api.extract(Some("abc"), None).await.status, 400);
        assert_eq!(api.extract(None, None).await.status, 400);
        assert!(store.all_exceptions().await.is_empty());
    }

    #[tokio::test]
    async fn test_extract_empty_store_is_204() {
        let (api, _store) = api();
        let response = api.extract(Some("10"), None).await;
        assert_eq!(response.status, 204);
    }

    #[tokio::test]
    async fn test_validate_requires_subject_key() {
        let (api, _store) = api();
        let request = ValidationRequest::new(Participant::default(), None);
        assert_eq!(api.validate(request).await.status, 400);
    }

    #[tokio::test]
    async fn test_validate_invalid_nhs_number_is_201_fatal() {
        let (api, store) = api();
        let participant = Participant::builder()
            .nhs_number("1234567890")
            .raw_record_type("ADD")
            .build()
            .unwrap();

        let response = api
            .validate(ValidationRequest::new(participant, Some("BSS.json".to_string())))
            .await;

        assert_eq!(response.status, 201);
        let body = response.body.unwrap();
        assert_eq!(body["isFatal"], true);
        assert_eq!(body["createdException"], true);
        let exceptions = store.all_exceptions().await;
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].category, ExceptionCategory::Validation);
    }

    #[tokio::test]
    async fn test_audit_filters() {
        let (api, _store) = api();
        let bad = AuditQueryParams {
            status_code: Some("418".to_string()),
            ..Default::default()
        };
        assert_eq!(api.retrieve_audit(&bad).await.status, 400);
        assert_eq!(
            api.retrieve_audit(&AuditQueryParams::default()).await.status,
            204
        );
        assert_eq!(api.outstanding_requests(Some("nope")).await.status, 400);
        assert_eq!(
            api.outstanding_requests(Some(&RequestId::generate().to_string()))
                .await
                .status,
            400
        );
    }

    #[tokio::test]
    async fn test_extract_store_failure_is_500_with_system_exception() {
        let (api, store) = unreachable_api();

        let response = api.extract(Some("10"), None).await;

        assert_eq!(response.status, 500);
        let exceptions = store.all_exceptions().await;
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].rule_description, SYSTEM_EXCEPTION_DESCRIPTION);
        assert_eq!(exceptions[0].category, ExceptionCategory::System);
        assert!(exceptions[0].is_fatal);
    }

    #[tokio::test]
    async fn test_validate_store_failure_is_500_with_system_exception() {
        let (api, store) = unreachable_api();

        let response = api.validate(valid_add()).await;

        assert_eq!(response.status, 500);
        let exceptions = store.all_exceptions().await;
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].rule_description, SYSTEM_EXCEPTION_DESCRIPTION);
        assert_eq!(exceptions[0].subject_key, "9434765919");
        assert!(exceptions[0].is_fatal);
    }

    #[tokio::test]
    async fn test_rule_error_is_500_and_not_committed() {
        let store = Arc::new(InMemoryStore::new());
        let stores = Stores::from_adapter(store.clone());
        let config = CohortConfig::in_memory();
        let pipeline = ValidationPipeline::new(&stores, &config.ingestion)
            .with_validator(RuleValidator::with_rules(&BROKEN_RULES));
        let api = CohortApi::new(&stores, &config).with_pipeline(pipeline);

        let response = api.validate(valid_add()).await;

        assert_eq!(response.status, 500);
        assert!(store.all_records().await.is_empty());
        let exceptions = store.all_exceptions().await;
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].rule_id, 0);
        assert_eq!(exceptions[0].rule_description, INTERNAL_ERROR_DESCRIPTION);
        assert_eq!(exceptions[0].category, ExceptionCategory::System);
        assert!(exceptions[0].is_fatal);
    }
}
