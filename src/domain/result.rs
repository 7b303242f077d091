//! Result type alias for the cohort pipeline

use super::errors::CohortError;

/// Result type alias for cohort operations
///
/// This is a convenience type alias that uses `CohortError` as the error type.
///
/// # Examples
///
/// ```
/// use cohort::domain::result::Result;
/// use cohort::domain::errors::CohortError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(CohortError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, CohortError>;
