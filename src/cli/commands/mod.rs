//! CLI command implementations

pub mod audit;
pub mod extract;
pub mod ingest;
pub mod init;
pub mod metric;
pub mod reconcile;
pub mod validate;

use crate::adapters::database::{create_stores, Stores};
use crate::config::{load_config, CohortConfig};
use crate::domain::CohortError;

/// Command completed
pub const EXIT_SUCCESS: i32 = 0;
/// Command ran and something failed
pub const EXIT_FAILURE: i32 = 1;
/// Configuration could not be loaded or is invalid
pub const EXIT_CONFIG_ERROR: i32 = 2;
/// Reconciliation found expected and processed counts differ
pub const EXIT_RECONCILIATION_MISMATCH: i32 = 3;

/// Load the configuration and open its stores
///
/// Prints the failure and returns the exit code to use when either step
/// fails.
pub(crate) async fn open(config_path: &str) -> Result<(CohortConfig, Stores), i32> {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            println!("❌ Failed to load configuration file");
            println!("   Error: {e}");
            return Err(EXIT_CONFIG_ERROR);
        }
    };

    match create_stores(&config).await {
        Ok(stores) => Ok((config, stores)),
        Err(e) => {
            println!("❌ Failed to open stores");
            println!("   Error: {e}");
            Err(match e {
                CohortError::Configuration(_) => EXIT_CONFIG_ERROR,
                _ => EXIT_FAILURE,
            })
        }
    }
}

/// Print an optional JSON body, pretty-printed
pub(crate) fn print_body(body: Option<&serde_json::Value>) -> anyhow::Result<()> {
    if let Some(body) = body {
        println!("{}", serde_json::to_string_pretty(body)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_config_is_config_error() {
        let result = open("/nonexistent/cohort.toml").await;
        assert!(matches!(result, Err(EXIT_CONFIG_ERROR)));
    }

    #[tokio::test]
    async fn test_open_memory_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.toml");
        std::fs::write(&path, "database_target = \"memory\"\n\n[application]\n").unwrap();

        let result = open(path.to_str().unwrap()).await;
        assert!(result.is_ok());
    }
}
