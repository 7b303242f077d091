//! Ingest command implementation
//!
//! Validates a file of candidate records and commits or rejects each one.

use super::{open, EXIT_FAILURE, EXIT_SUCCESS};
use crate::core::ingestion::{ValidationPipeline, ValidationRequest};
use crate::domain::Participant;
use anyhow::Context;
use clap::Args;
use std::path::Path;

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSON file holding an array of candidate records
    #[arg(short, long)]
    pub file: String,

    /// Source file name recorded on exceptions (defaults to the file's name)
    #[arg(long)]
    pub file_name: Option<String>,
}

impl IngestArgs {
    /// Execute the ingest command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let contents = std::fs::read_to_string(&self.file)
            .with_context(|| format!("Failed to read {}", self.file))?;
        let requests = parse_requests(&contents, self.source_name())
            .with_context(|| format!("Failed to parse {}", self.file))?;

        println!("📥 Ingesting {} candidate records from {}", requests.len(), self.file);

        let (config, stores) = match open(config_path).await {
            Ok(opened) => opened,
            Err(code) => return Ok(code),
        };

        let pipeline = ValidationPipeline::new(&stores, &config.ingestion);
        let summary = pipeline.ingest_all(requests).await;
        summary.log_summary();

        println!("{}", serde_json::to_string_pretty(&summary)?);

        if summary.is_successful() {
            println!("✅ Ingestion completed");
            Ok(EXIT_SUCCESS)
        } else {
            println!("❌ {} records could not be processed", summary.failed);
            Ok(EXIT_FAILURE)
        }
    }

    fn source_name(&self) -> Option<String> {
        self.file_name.clone().or_else(|| {
            Path::new(&self.file)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
    }
}

/// Accepts either bare candidate records or full validation requests
///
/// Bare records take `file_name`; requests keep their own unless they have
/// none.
fn parse_requests(
    contents: &str,
    file_name: Option<String>,
) -> serde_json::Result<Vec<ValidationRequest>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(contents)?;

    values
        .into_iter()
        .map(|value| {
            if value.get("participant").is_some() {
                let mut request: ValidationRequest = serde_json::from_value(value)?;
                if request.file_name.is_none() {
                    request.file_name = file_name.clone();
                }
                Ok(request)
            } else {
                let participant: Participant = serde_json::from_value(value)?;
                Ok(ValidationRequest::new(participant, file_name.clone()))
            }
        })
        .collect()
}
