//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that flow through the pipeline.
//! Each type ensures type safety and validates format on construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// NHS number newtype wrapper
///
/// The subject key of every cohort record: ten digits whose last digit is a
/// modulus 11 check digit over the first nine.
///
/// # Examples
///
/// ```
/// use cohort::domain::ids::NhsNumber;
/// use std::str::FromStr;
///
/// let nhs_number = NhsNumber::from_str("9876543210").unwrap();
/// assert_eq!(nhs_number.as_str(), "9876543210");
/// assert!(NhsNumber::from_str("9876543219").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NhsNumber(String);

impl NhsNumber {
    /// Creates a new NhsNumber, validating length, digits and check digit
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        let trimmed = value.trim();
        if !Self::is_valid(trimmed) {
            return Err(format!("Invalid NHS number: '{}'", mask(trimmed)));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Checks a candidate string without allocating
    pub fn is_valid(value: &str) -> bool {
        let bytes = value.as_bytes();
        if bytes.len() != 10 || !bytes.iter().all(u8::is_ascii_digit) {
            return false;
        }

        // Repeated-digit numbers pass the checksum but are never issued
        if bytes.iter().all(|b| *b == bytes[0]) {
            return false;
        }

        let digits: Vec<u32> = bytes.iter().map(|b| u32::from(b - b'0')).collect();
        let sum: u32 = digits[..9]
            .iter()
            .zip((2..=10).rev())
            .map(|(digit, weight)| digit * weight)
            .sum();

        let check = match 11 - (sum % 11) {
            11 => 0,
            10 => return false,
            check => check,
        };

        check == digits[9]
    }

    /// Returns the NHS number as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number with all but the last four digits hidden, for logs
    pub fn masked(&self) -> String {
        mask(&self.0)
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Masks a subject key for logging
pub fn mask(value: &str) -> String {
    let count = value.chars().count();
    let hidden = count - count.min(4);
    value
        .chars()
        .enumerate()
        .map(|(i, c)| if i < hidden { '*' } else { c })
        .collect()
}

impl fmt::Display for NhsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NhsNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NhsNumber {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NhsNumber> for String {
    fn from(value: NhsNumber) -> Self {
        value.0
    }
}

impl AsRef<str> for NhsNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extraction request identifier
///
/// Issued once per fresh extraction and recorded in the request audit.
///
/// # Examples
///
/// ```
/// use cohort::domain::ids::RequestId;
/// use std::str::FromStr;
///
/// let id = RequestId::from_str("3f2c9a4e-6b1d-4c8e-9f7a-2d5b8e1c0a93").unwrap();
/// assert_eq!(id.to_string(), "3f2c9a4e-6b1d-4c8e-9f7a-2d5b8e1c0a93");
/// assert!(RequestId::from_str("not-a-guid").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new random request id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let id = Uuid::parse_str(trimmed)
            .map_err(|_| format!("Invalid request id: '{}'", trimmed))?;
        if id.is_nil() {
            return Err("Request id cannot be the empty identifier".to_string());
        }
        Ok(Self(id))
    }
}
