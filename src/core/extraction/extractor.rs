//! Batch extractor
//!
//! Hands out cohort distribution records exactly once per extraction cycle.
//!
//! - No request id: fresh extraction under a newly issued id.
//! - Known request id whose audit entry recorded a 200 and that has records
//!   tagged to it: replay those records as they are, without touching any
//!   store.
//! - Any other known request id: fall back to a fresh extraction.
//! - Unknown request id: client error.
//!
//! A fresh extraction writes its request audit entry before claiming any
//! record, so every tagged record refers to an existing audit entry.

use super::request::ExtractionRequest;
use crate::adapters::database::{CohortDistributionStore, RequestAuditLedger, Stores};
use crate::config::ExtractionConfig;
use crate::core::retry::{Attempt, RetryPolicy};
use crate::domain::{
    CohortDistributionRecord, CohortError, ExtractionError, RequestAuditEntry, RequestId, Result,
};
use std::sync::Arc;

/// Records handed out by one extraction call
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionBatch {
    pub records: Vec<CohortDistributionRecord>,
    /// Id the records are tagged with; also set for an empty fresh batch
    pub request_id: Option<RequestId>,
    /// True when the records were already handed out under this id
    pub replay: bool,
}

impl ExtractionBatch {
    fn fresh(records: Vec<CohortDistributionRecord>, request_id: RequestId) -> Self {
        Self {
            records,
            request_id: Some(request_id),
            replay: false,
        }
    }

    fn replayed(records: Vec<CohortDistributionRecord>, request_id: RequestId) -> Self {
        Self {
            records,
            request_id: Some(request_id),
            replay: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 200 with records, 204 without
    pub fn status_code(&self) -> u16 {
        if self.is_empty() {
            204
        } else {
            200
        }
    }
}

/// Resolves extraction requests against the request audit and record store
#[derive(Clone)]
pub struct BatchExtractor {
    records: Arc<dyn CohortDistributionStore + Send + Sync>,
    audit: Arc<dyn RequestAuditLedger + Send + Sync>,
    retry: RetryPolicy,
    max_row_count: usize,
}

impl BatchExtractor {
    pub fn new(stores: &Stores, config: &ExtractionConfig) -> Self {
        Self {
            records: stores.records.clone(),
            audit: stores.audit.clone(),
            retry: RetryPolicy::from_config(&config.retry),
            max_row_count: config.max_row_count,
        }
    }

    /// Replace the retry policy used when a claim loses every row
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_row_count(&self) -> usize {
        self.max_row_count
    }

    /// Parse raw parameters and extract
    pub async fn extract_raw(
        &self,
        row_count: Option<&str>,
        request_id: Option<&str>,
    ) -> Result<ExtractionBatch> {
        let request = ExtractionRequest::parse(row_count, request_id, self.max_row_count)?;
        self.extract(request).await
    }

    /// Serve an extraction request
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::UnknownRequestId` when the id was never
    /// issued, and store errors as they occur. A store error can leave an
    /// audit entry with nothing tagged to it; replaying that id falls back to
    /// a fresh extraction.
    pub async fn extract(&self, request: ExtractionRequest) -> Result<ExtractionBatch> {
        let row_count = request.row_count.min(self.max_row_count).max(1);

        if let Some(request_id) = request.request_id {
            let Some(entry) = self.audit.audit_entry(request_id).await? else {
                tracing::warn!(request_id = %request_id, "Unknown request id");
                return Err(ExtractionError::UnknownRequestId(request_id.to_string()).into());
            };

            if entry.status_code == 200 {
                let tagged = self.records.records_for_request(request_id).await?;
                if !tagged.is_empty() {
                    crate::log_extraction_served!(&request_id, row_count, tagged.len(), true);
                    return Ok(ExtractionBatch::replayed(tagged, request_id));
                }
            }

            tracing::info!(
                request_id = %request_id,
                "No records tagged with request id, starting a fresh extraction"
            );
        }

        self.extract_fresh(row_count).await
    }

    /// Issue a new id, write its audit entry once, then claim
    ///
    /// The entry's status comes from the first selection: 204 when nothing
    /// was eligible, otherwise 200. Retries after a lost claim reuse the same
    /// id and never write a second entry.
    async fn extract_fresh(&self, row_count: usize) -> Result<ExtractionBatch> {
        let request_id = RequestId::generate();
        let candidates = self.records.select_unextracted(row_count).await?;
        let status_code = if candidates.is_empty() { 204 } else { 200 };

        self.audit
            .append_audit_entry(&RequestAuditEntry::new(
                request_id,
                status_code,
                i32::try_from(row_count).unwrap_or(i32::MAX),
            ))
            .await?;

        let batch = if candidates.is_empty() {
            ExtractionBatch::fresh(Vec::new(), request_id)
        } else {
            self.claim_with_retry(request_id, row_count, candidates)
                .await?
        };

        crate::log_extraction_served!(&request_id, row_count, batch.len(), false);
        Ok(batch)
    }

    async fn claim_with_retry(
        &self,
        request_id: RequestId,
        row_count: usize,
        candidates: Vec<CohortDistributionRecord>,
    ) -> Result<ExtractionBatch> {
        let records = &self.records;
        let mut preselected = Some(candidates);

        self.retry
            .run("claim_records", |attempt| {
                let preselected = preselected.take();
                async move {
                    let candidates = match preselected {
                        Some(candidates) => candidates,
                        None => records.select_unextracted(row_count).await?,
                    };
                    if candidates.is_empty() {
                        return Ok(Attempt::Done(ExtractionBatch::fresh(Vec::new(), request_id)));
                    }

                    let ids: Vec<i64> = candidates
                        .iter()
                        .map(|r| r.cohort_distribution_id)
                        .collect();
                    let claimed = records.claim_records(request_id, &ids).await?;

                    if claimed.is_empty() {
                        tracing::debug!(
                            request_id = %request_id,
                            attempt = attempt,
                            "Every selected record was claimed concurrently"
                        );
                        return Ok(Attempt::Retry(ExtractionBatch::fresh(claimed, request_id)));
                    }

                    if claimed.len() < candidates.len() {
                        tracing::debug!(
                            request_id = %request_id,
                            selected = candidates.len(),
                            claimed = claimed.len(),
                            "Some selected records were claimed concurrently"
                        );
                    }

                    Ok::<_, CohortError>(Attempt::Done(ExtractionBatch::fresh(claimed, request_id)))
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::{AuditQuery, NhsNumber, Participant};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Record store whose claims always lose to another caller
    struct LosingClaims {
        inner: Arc<InMemoryStore>,
        claims: AtomicUsize,
    }

    #[async_trait]
    impl CohortDistributionStore for LosingClaims {
        async fn insert_record(
            &self,
            record: CohortDistributionRecord,
        ) -> Result<CohortDistributionRecord> {
            self.inner.insert_record(record).await
        }

        async fn latest_for_subject(
            &self,
            nhs_number: &NhsNumber,
        ) -> Result<Option<CohortDistributionRecord>> {
            self.inner.latest_for_subject(nhs_number).await
        }

        async fn select_unextracted(
            &self,
            row_count: usize,
        ) -> Result<Vec<CohortDistributionRecord>> {
            self.inner.select_unextracted(row_count).await
        }

        async fn claim_records(
            &self,
            _request_id: RequestId,
            _ids: &[i64],
        ) -> Result<Vec<CohortDistributionRecord>> {
            self.claims.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn records_for_request(
            &self,
            request_id: RequestId,
        ) -> Result<Vec<CohortDistributionRecord>> {
            self.inner.records_for_request(request_id).await
        }

        async fn count_inserted_since(&self, since: DateTime<Utc>) -> Result<u64> {
            self.inner.count_inserted_since(since).await
        }
    }

    async fn seeded_store(count: usize) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for _ in 0..count {
            let participant = Participant::builder().nhs_number("9434765919").build().unwrap();
            let record = CohortDistributionRecord::from_participant(
                &participant,
                NhsNumber::new("9434765919").unwrap(),
                false,
                Utc::now(),
            );
            store.insert_record(record).await.unwrap();
        }
        store
    }

    fn extractor(store: Arc<InMemoryStore>) -> BatchExtractor {
        BatchExtractor::new(&Stores::from_adapter(store), &ExtractionConfig::default())
            .with_retry_policy(RetryPolicy::immediate(3))
    }

    #[tokio::test]
    async fn test_fresh_extraction_tags_records_and_writes_audit() {
        let store = seeded_store(3).await;
        let extractor = extractor(store.clone());

        let batch = extractor.extract(ExtractionRequest::new(2, None)).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.status_code(), 200);
        assert!(!batch.replay);
        let request_id = batch.request_id.unwrap();
        assert!(batch.records.iter().all(|r| r.is_extracted && r.request_id == Some(request_id)));

        let entry = store.audit_entry(request_id).await.unwrap().unwrap();
        assert_eq!(entry.status_code, 200);
        assert_eq!(entry.row_count_requested, 2);
    }

    #[tokio::test]
    async fn test_nothing_to_extract_is_204() {
        let store = seeded_store(0).await;
        let batch = extractor(store.clone())
            .extract(ExtractionRequest::new(10, None))
            .await
            .unwrap();

        assert!(batch.is_empty());
        assert_eq!(batch.status_code(), 204);
        let entry = store
            .audit_entry(batch.request_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status_code, 204);
    }

    #[tokio::test]
    async fn test_unknown_request_id_is_rejected() {
        let store = seeded_store(1).await;
        let err = extractor(store.clone())
            .extract(ExtractionRequest::new(10, Some(RequestId::generate())))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CohortError::Extraction(ExtractionError::UnknownRequestId(_))
        ));
        assert!(!store.all_records().await[0].is_extracted);
    }

    #[tokio::test]
    async fn test_row_count_is_capped() {
        let store = seeded_store(3).await;
        let config = ExtractionConfig {
            max_row_count: 2,
            ..ExtractionConfig::default()
        };
        let extractor = BatchExtractor::new(&Stores::from_adapter(store), &config);

        let batch = extractor.extract_raw(Some("50"), None).await.unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn test_extract_raw_rejects_before_store_access() {
        let store = seeded_store(1).await;
        let extractor = extractor(store.clone());

        assert!(extractor.extract_raw(Some("0"), None).await.is_err());
        assert!(extractor.extract_raw(Some("1"), Some("xyz")).await.is_err());
        assert!(store
            .query_audit(&crate::domain::AuditQuery::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_lost_claims_write_one_audit_entry() {
        let store = seeded_store(3).await;
        let losing = Arc::new(LosingClaims {
            inner: store.clone(),
            claims: AtomicUsize::new(0),
        });
        let mut stores = Stores::from_adapter(store.clone());
        stores.records = losing.clone();
        let extractor = BatchExtractor::new(&stores, &ExtractionConfig::default())
            .with_retry_policy(RetryPolicy::immediate(4));

        let batch = extractor.extract_raw(Some("3"), None).await.unwrap();

        assert!(batch.is_empty());
        assert_eq!(losing.claims.load(Ordering::SeqCst), 4);
        let entries = store.query_audit(&AuditQuery::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(Some(entries[0].request_id), batch.request_id);
    }

    #[tokio::test]
    async fn test_no_content_entry_never_replays() {
        let store = seeded_store(0).await;
        let extractor = extractor(store.clone());
        let empty = extractor
            .extract(ExtractionRequest::new(5, None))
            .await
            .unwrap();
        let issued = empty.request_id.unwrap();

        // Rows arrive after the 204; the old id starts a fresh extraction
        let participant = Participant::builder().nhs_number("9434765919").build().unwrap();
        let record = CohortDistributionRecord::from_participant(
            &participant,
            NhsNumber::new("9434765919").unwrap(),
            false,
            Utc::now(),
        );
        store.insert_record(record).await.unwrap();

        let batch = extractor
            .extract(ExtractionRequest::new(5, Some(issued)))
            .await
            .unwrap();

        assert!(!batch.replay);
        assert_eq!(batch.len(), 1);
        assert_ne!(batch.request_id, Some(issued));
    }
}
