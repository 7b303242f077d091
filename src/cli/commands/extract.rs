//! Extract command implementation
//!
//! Hands out the next batch of cohort distribution records, or replays an
//! earlier batch by request id.

use super::{open, print_body, EXIT_FAILURE, EXIT_SUCCESS};
use crate::api::CohortApi;
use clap::Args;

/// Arguments for the extract command
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Number of records to hand out (1 to the configured maximum)
    #[arg(short, long)]
    pub row_count: String,

    /// Replay the batch issued under this request id
    #[arg(long)]
    pub request_id: Option<String>,
}

impl ExtractArgs {
    /// Execute the extract command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(
            row_count = %self.row_count,
            request_id = ?self.request_id,
            "Extracting cohort distribution batch"
        );

        let (config, stores) = match open(config_path).await {
            Ok(opened) => opened,
            Err(code) => return Ok(code),
        };

        let api = CohortApi::new(&stores, &config);
        let response = api
            .extract(Some(&self.row_count), self.request_id.as_deref())
            .await;

        match response.status {
            204 => {
                eprintln!("No records available");
                Ok(EXIT_SUCCESS)
            }
            status if response.is_success() => {
                tracing::debug!(status, "Extraction served");
                print_body(response.body.as_ref())?;
                Ok(EXIT_SUCCESS)
            }
            status => {
                eprintln!("❌ Extraction failed ({status})");
                print_body(response.body.as_ref())?;
                Ok(EXIT_FAILURE)
            }
        }
    }
}
