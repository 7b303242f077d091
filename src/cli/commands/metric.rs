//! Metric command implementation
//!
//! Feeds inbound "records received" events from a file through the metric
//! handler, as the message consumer would.

use super::{open, EXIT_FAILURE, EXIT_SUCCESS};
use crate::api::CohortApi;
use crate::core::ingestion::MetricDisposition;
use anyhow::Context;
use clap::Args;

/// Arguments for the metric command
#[derive(Args, Debug)]
pub struct MetricArgs {
    /// JSON file holding one event or an array of events
    #[arg(short, long)]
    pub file: String,
}

/// Counts of each disposition
#[derive(Debug, Default, PartialEq, Eq)]
struct MetricTally {
    completed: usize,
    deferred: usize,
    dead_lettered: usize,
}

impl MetricTally {
    fn add(&mut self, disposition: &MetricDisposition) {
        match disposition {
            MetricDisposition::Complete(_) => self.completed += 1,
            MetricDisposition::Defer(_) => self.deferred += 1,
            MetricDisposition::DeadLetter(_) => self.dead_lettered += 1,
        }
    }
}

impl MetricArgs {
    /// Execute the metric command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let contents = std::fs::read_to_string(&self.file)
            .with_context(|| format!("Failed to read {}", self.file))?;
        let payloads = split_payloads(&contents)
            .with_context(|| format!("Failed to parse {}", self.file))?;

        let (config, stores) = match open(config_path).await {
            Ok(opened) => opened,
            Err(code) => return Ok(code),
        };

        let api = CohortApi::new(&stores, &config);
        let mut tally = MetricTally::default();
        for payload in &payloads {
            let disposition = api.inbound_metric(payload).await;
            if let MetricDisposition::Defer(reason) | MetricDisposition::DeadLetter(reason) =
                &disposition
            {
                println!("⚠️  {reason}");
            }
            tally.add(&disposition);
        }

        println!("📊 Inbound metrics");
        println!("  Completed: {}", tally.completed);
        println!("  Deferred: {}", tally.deferred);
        println!("  Dead-lettered: {}", tally.dead_lettered);

        Ok(if tally.completed == payloads.len() {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        })
    }
}

/// One payload per event; a top-level array is split into its elements
fn split_payloads(contents: &str) -> serde_json::Result<Vec<String>> {
    match serde_json::from_str::<serde_json::Value>(contents)? {
        serde_json::Value::Array(events) => events
            .iter()
            .map(serde_json::to_string)
            .collect(),
        _ => Ok(vec![contents.to_string()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_single_event() {
        let payloads = split_payloads(r#"{"auditProcess": "AuditProcess"}"#).unwrap();
        assert_eq!(payloads.len(), 1);
    }

    #[test]
    fn test_split_array() {
        let payloads = split_payloads(r#"[{"recordCount": 1}, {"recordCount": 2}]"#).unwrap();
        assert_eq!(payloads.len(), 2);
        assert!(payloads[1].contains("\"recordCount\":2"));
    }

    #[test]
    fn test_split_rejects_malformed_json() {
        assert!(split_payloads("not json").is_err());
    }
}
