//! Store factory
//!
//! This module builds the store trait objects for the configured backend.

use crate::adapters::database::traits::{
    CohortDistributionStore, ExceptionLog, InboundMetricStore, RequestAuditLedger, StateStorage,
};
use crate::adapters::memory::InMemoryStore;
use crate::adapters::postgresql::adapter::PostgreSQLAdapter;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::{CohortConfig, DatabaseTarget};
use crate::domain::{CohortError, Result};
use std::sync::Arc;

/// Every store the pipeline needs, backed by one shared adapter
#[derive(Clone)]
pub struct Stores {
    pub records: Arc<dyn CohortDistributionStore + Send + Sync>,
    pub audit: Arc<dyn RequestAuditLedger + Send + Sync>,
    pub exceptions: Arc<dyn ExceptionLog + Send + Sync>,
    pub metrics: Arc<dyn InboundMetricStore + Send + Sync>,
    pub state: Arc<dyn StateStorage + Send + Sync>,
}

impl Stores {
    /// Wrap a single adapter that implements every store trait
    pub fn from_adapter<A>(adapter: Arc<A>) -> Self
    where
        A: CohortDistributionStore
            + RequestAuditLedger
            + ExceptionLog
            + InboundMetricStore
            + StateStorage
            + Send
            + Sync
            + 'static,
    {
        Self {
            records: adapter.clone(),
            audit: adapter.clone(),
            exceptions: adapter.clone(),
            metrics: adapter.clone(),
            state: adapter,
        }
    }

    /// Stores over a fresh in-memory backend
    pub fn in_memory() -> Self {
        Self::from_adapter(Arc::new(InMemoryStore::new()))
    }
}

/// Create the stores for the configured backend
///
/// For PostgreSQL the connection is tested and the schema migration is run
/// before the stores are returned, so a bad connection string fails here
/// rather than on the first request.
///
/// # Errors
///
/// Returns an error if the backend cannot be reached or initialised.
pub async fn create_stores(config: &CohortConfig) -> Result<Stores> {
    match config.database_target {
        DatabaseTarget::Memory => {
            tracing::info!("Creating in-memory stores");
            Ok(Stores::in_memory())
        }
        DatabaseTarget::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                CohortError::Configuration(
                    "postgresql configuration is required when database_target = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL client and stores");
            let client = Arc::new(PostgreSQLClient::new(pg_config.clone()).await?);
            let adapter = Arc::new(PostgreSQLAdapter::new_with_arc(client));
            adapter.test_connection().await?;
            adapter.ensure_schema().await?;

            Ok(Stores::from_adapter(adapter))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{
        ApplicationConfig, Environment, ExtractionConfig, IngestionConfig, LoggingConfig,
        ReconciliationConfig,
    };
    use crate::domain::{InboundMetric, RequestAuditEntry, RequestId};
    use chrono::Utc;

    fn memory_config() -> CohortConfig {
        CohortConfig {
            application: ApplicationConfig::default(),
            environment: Environment::Development,
            database_target: DatabaseTarget::Memory,
            postgresql: None,
            extraction: ExtractionConfig::default(),
            ingestion: IngestionConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_memory_stores_share_one_backend() {
        let stores = create_stores(&memory_config()).await.unwrap();

        let entry = RequestAuditEntry::new(RequestId::generate(), 200, 10);
        stores.audit.append_audit_entry(&entry).await.unwrap();
        assert!(stores
            .audit
            .audit_entry(entry.request_id)
            .await
            .unwrap()
            .is_some());

        let since = Utc::now() - chrono::Duration::minutes(1);
        let metric = InboundMetric {
            metric_audit_id: uuid::Uuid::new_v4(),
            process_name: "AuditProcess".to_string(),
            received_date_time: Utc::now(),
            source: "test".to_string(),
            record_count: 3,
        };
        stores.metrics.append_metric(&metric).await.unwrap();
        assert_eq!(
            stores
                .metrics
                .sum_record_count_since("AuditProcess", since)
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_postgresql_target_without_section_fails() {
        let mut config = memory_config();
        config.database_target = DatabaseTarget::PostgreSQL;
        let result = create_stores(&config).await;
        assert!(matches!(result, Err(CohortError::Configuration(_))));
    }
}
