//! Request audit queries
//!
//! Read-only views over the request audit used by operators and by the
//! consumer to find requests it has not seen yet.

use crate::adapters::database::RequestAuditLedger;
use crate::domain::{AuditQuery, ExtractionError, RequestAuditEntry, RequestId, Result};
use chrono::NaiveDate;
use std::sync::Arc;

/// Status codes that can appear in the request audit
pub const AUDITED_STATUS_CODES: [u16; 3] = [200, 204, 500];

/// Raw audit query parameters as received
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQueryParams {
    pub request_id: Option<String>,
    pub status_code: Option<String>,
    /// `yyyyMMdd`
    pub date_from: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AuditQueryParams {
    /// Validate the raw parameters into a query
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::InvalidFilter` for a malformed request id,
    /// a status code other than 200, 204 or 500, or a malformed date.
    pub fn parse(&self) -> std::result::Result<AuditQuery, ExtractionError> {
        let request_id = non_blank(&self.request_id)
            .map(|raw| {
                raw.parse::<RequestId>()
                    .map_err(|_| ExtractionError::InvalidFilter(format!("requestId '{}'", raw)))
            })
            .transpose()?;

        let status_code = non_blank(&self.status_code)
            .map(|raw| {
                raw.parse::<u16>()
                    .ok()
                    .filter(|code| AUDITED_STATUS_CODES.contains(code))
                    .ok_or_else(|| {
                        ExtractionError::InvalidFilter(format!(
                            "statusCode '{}' must be one of 200, 204, 500",
                            raw
                        ))
                    })
            })
            .transpose()?;

        let date_from = non_blank(&self.date_from)
            .map(|raw| {
                let valid = raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit());
                valid
                    .then(|| NaiveDate::parse_from_str(raw, "%Y%m%d").ok())
                    .flatten()
                    .ok_or_else(|| {
                        ExtractionError::InvalidFilter(format!(
                            "dateFrom '{}' must be yyyyMMdd",
                            raw
                        ))
                    })
            })
            .transpose()?;

        Ok(AuditQuery {
            request_id,
            status_code,
            date_from,
        })
    }
}

/// Read access to the request audit
#[derive(Clone)]
pub struct AuditService {
    audit: Arc<dyn RequestAuditLedger + Send + Sync>,
}

impl AuditService {
    pub fn new(audit: Arc<dyn RequestAuditLedger + Send + Sync>) -> Self {
        Self { audit }
    }

    /// Entries matching the filter, oldest first
    pub async fn retrieve(&self, query: &AuditQuery) -> Result<Vec<RequestAuditEntry>> {
        self.audit.query_audit(query).await
    }

    /// Entries created after `last_request_id`, oldest first
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::UnknownRequestId` when the id was never issued.
    pub async fn outstanding(&self, last_request_id: RequestId) -> Result<Vec<RequestAuditEntry>> {
        let last = self
            .audit
            .audit_entry(last_request_id)
            .await?
            .ok_or_else(|| ExtractionError::UnknownRequestId(last_request_id.to_string()))?;

        self.audit.audit_entries_after(last.created_at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::CohortError;
    use chrono::{Duration, Utc};
    use test_case::test_case;

    fn params(request_id: Option<&str>, status: Option<&str>, date: Option<&str>) -> AuditQueryParams {
        AuditQueryParams {
            request_id: request_id.map(str::to_string),
            status_code: status.map(str::to_string),
            date_from: date.map(str::to_string),
        }
    }

    #[test]
    fn test_empty_params_match_everything() {
        assert_eq!(params(None, Some(" "), None).parse().unwrap(), AuditQuery::default());
    }

    #[test]
    fn test_valid_params() {
        let id = RequestId::generate();
        let query = params(Some(&id.to_string()), Some("204"), Some("20241225"))
            .parse()
            .unwrap();
        assert_eq!(query.request_id, Some(id));
        assert_eq!(query.status_code, Some(204));
        assert_eq!(query.date_from, NaiveDate::from_ymd_opt(2024, 12, 25));
    }

    #[test_case(Some("nope"), None, None; "bad request id")]
    #[test_case(None, Some("404"), None; "unaudited status")]
    #[test_case(None, Some("abc"), None; "non numeric status")]
    #[test_case(None, None, Some("2024-12-25"); "iso date")]
    #[test_case(None, None, Some("20241332"); "impossible date")]
    #[test_case(None, None, Some("202412"); "short date")]
    fn test_invalid_params(request_id: Option<&str>, status: Option<&str>, date: Option<&str>) {
        assert!(matches!(
            params(request_id, status, date).parse(),
            Err(ExtractionError::InvalidFilter(_))
        ));
    }

    #[tokio::test]
    async fn test_outstanding_returns_later_entries() {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let mut ids = Vec::new();
        for offset in 0..3 {
            let mut entry = RequestAuditEntry::new(RequestId::generate(), 200, 10);
            entry.created_at = now + Duration::seconds(offset);
            store.append_audit_entry(&entry).await.unwrap();
            ids.push(entry.request_id);
        }
        let service = AuditService::new(store);

        let outstanding = service.outstanding(ids[0]).await.unwrap();
        let outstanding_ids: Vec<_> = outstanding.iter().map(|e| e.request_id).collect();
        assert_eq!(outstanding_ids, vec![ids[1], ids[2]]);

        assert!(service.outstanding(ids[2]).await.unwrap().is_empty());
        assert!(matches!(
            service.outstanding(RequestId::generate()).await,
            Err(CohortError::Extraction(ExtractionError::UnknownRequestId(_)))
        ));
    }
}
