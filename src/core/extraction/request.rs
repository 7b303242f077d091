//! Extraction request parsing
//!
//! Both parameters arrive as strings. Parsing happens before any store is
//! touched, so a bad request never leaves a trace in the request audit.

use crate::domain::{ExtractionError, RequestId};

/// A validated extraction request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// Rows to hand out, already capped at the configured maximum
    pub row_count: usize,
    /// Previously issued id to replay, if any
    pub request_id: Option<RequestId>,
}

impl ExtractionRequest {
    pub fn new(row_count: usize, request_id: Option<RequestId>) -> Self {
        Self {
            row_count,
            request_id,
        }
    }

    /// Parse raw `rowCount` and `requestId` parameters
    ///
    /// A blank `requestId` counts as absent. `rowCount` above `max_row_count`
    /// is capped rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns an `ExtractionError` for a missing or non-numeric `rowCount`,
    /// a `rowCount` of zero or less, or a malformed `requestId`.
    pub fn parse(
        row_count: Option<&str>,
        request_id: Option<&str>,
        max_row_count: usize,
    ) -> Result<Self, ExtractionError> {
        let raw = row_count.map(str::trim).unwrap_or_default();
        let requested: i64 = raw
            .parse()
            .map_err(|_| ExtractionError::InvalidRowCount(raw.to_string()))?;

        if requested <= 0 {
            return Err(ExtractionError::NonPositiveRowCount(requested));
        }

        let request_id = match request_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw_id) => Some(
                raw_id
                    .parse::<RequestId>()
                    .map_err(|_| ExtractionError::MalformedRequestId(raw_id.to_string()))?,
            ),
            None => None,
        };

        let row_count = usize::try_from(requested)
            .unwrap_or(usize::MAX)
            .min(max_row_count.max(1));

        Ok(Self {
            row_count,
            request_id,
        })
    }
}
