//! Transport-agnostic endpoint responses

use crate::domain::{CohortError, CohortDistributionRecord, RequestId};
use serde::Serialize;
use serde_json::{json, Value};

/// Status code and optional JSON body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ApiResponse {
    /// 200 with a body
    pub fn ok<T: Serialize>(body: &T) -> Self {
        Self::with_body(200, body)
    }

    /// 201 with a body
    pub fn created<T: Serialize>(body: &T) -> Self {
        Self::with_body(201, body)
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            body: Some(json!({ "error": message.into() })),
        }
    }

    pub fn internal_error() -> Self {
        Self {
            status: 500,
            body: Some(json!({ "error": "An unexpected error occurred" })),
        }
    }

    /// 400 for client errors, 500 for everything else
    pub fn from_error(err: &CohortError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            Self::internal_error()
        }
    }

    /// Serializes `body`; a body that fails to serialize becomes a 500
    pub fn with_body<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => Self {
                status,
                body: Some(value),
            },
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize response body");
                Self::internal_error()
            }
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Body of a successful extraction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse<'a> {
    pub request_id: Option<RequestId>,
    pub records: &'a [CohortDistributionRecord],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExtractionError, StoreError};

    #[test]
    fn test_error_mapping() {
        let client: CohortError = ExtractionError::NonPositiveRowCount(0).into();
        let response = ApiResponse::from_error(&client);
        assert_eq!(response.status, 400);
        assert!(response.body.unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("greater than zero"));

        let server: CohortError = StoreError::Timeout("slow".to_string()).into();
        let response = ApiResponse::from_error(&server);
        assert_eq!(response.status, 500);
        // Store details stay out of the response
        assert!(!response.body.unwrap().to_string().contains("slow"));
    }

    #[test]
    fn test_no_content_has_no_body() {
        let response = ApiResponse::no_content();
        assert!(response.is_success());
        assert!(response.body.is_none());
    }
}
