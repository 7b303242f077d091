//! Audit command implementation
//!
//! Queries the request audit, or lists the requests issued after a given one.

use super::{open, print_body, EXIT_FAILURE, EXIT_SUCCESS};
use crate::api::CohortApi;
use crate::core::extraction::AuditQueryParams;
use clap::Args;

/// Arguments for the audit command
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Only the entry with this request id
    #[arg(long)]
    pub request_id: Option<String>,

    /// Only entries with this status code (200, 204 or 500)
    #[arg(long)]
    pub status_code: Option<String>,

    /// Only entries created on or after this date (yyyyMMdd)
    #[arg(long)]
    pub date_from: Option<String>,

    /// List entries created after this request id instead of filtering
    #[arg(long, conflicts_with_all = ["request_id", "status_code", "date_from"])]
    pub after: Option<String>,
}

impl AuditArgs {
    fn params(&self) -> AuditQueryParams {
        AuditQueryParams {
            request_id: self.request_id.clone(),
            status_code: self.status_code.clone(),
            date_from: self.date_from.clone(),
        }
    }

    /// Execute the audit command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let (config, stores) = match open(config_path).await {
            Ok(opened) => opened,
            Err(code) => return Ok(code),
        };

        let api = CohortApi::new(&stores, &config);
        let response = match self.after.as_deref() {
            Some(after) => api.outstanding_requests(Some(after)).await,
            None => api.retrieve_audit(&self.params()).await,
        };

        if response.status == 204 {
            eprintln!("No matching audit entries");
            return Ok(EXIT_SUCCESS);
        }

        print_body(response.body.as_ref())?;
        Ok(if response.is_success() {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_mapping() {
        let args = AuditArgs {
            request_id: None,
            status_code: Some("204".to_string()),
            date_from: Some("20250101".to_string()),
            after: None,
        };
        let params = args.params();
        assert_eq!(params.status_code.as_deref(), Some("204"));
        assert_eq!(params.date_from.as_deref(), Some("20250101"));
        assert!(params.request_id.is_none());
    }
}
