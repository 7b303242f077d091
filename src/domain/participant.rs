//! Participant and cohort distribution domain models
//!
//! A [`Participant`] is a candidate record as it arrives from an inbound
//! feed; nothing about it is trusted yet. A [`CohortDistributionRecord`] is
//! what survives validation and is committed for distribution.

use super::ids::{NhsNumber, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record type carried on every inbound row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// New participant
    Add,
    /// Change to an existing participant
    Amended,
    /// Participant removed from the cohort
    Removed,
}

impl RecordType {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Add => "ADD",
            RecordType::Amended => "AMENDED",
            RecordType::Removed => "REMOVED",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ADD" => Ok(RecordType::Add),
            "AMENDED" => Ok(RecordType::Amended),
            "REMOVED" => Ok(RecordType::Removed),
            other => Err(format!("Unknown record type: '{}'", other)),
        }
    }
}

/// Death status reported by the demographic source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeathStatus {
    /// Reported but not verified
    Informal,
    /// Verified by a death certificate
    Formal,
}

/// Demographic and screening payload shared by candidates and committed records
///
/// Dates are kept in their business string form (`ccyymmdd`, `ccyymm` or
/// `ccyy`); the rule validator is responsible for checking them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Demographics {
    pub primary_care_provider: Option<String>,
    pub primary_care_provider_effective_from_date: Option<String>,
    pub name_prefix: Option<String>,
    pub given_name: Option<String>,
    pub other_given_names: Option<String>,
    pub family_name: Option<String>,
    pub previous_family_name: Option<String>,
    pub date_of_birth: Option<String>,
    /// 0 not known, 1 male, 2 female, 9 not specified
    pub gender: Option<i16>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub address_line3: Option<String>,
    pub address_line4: Option<String>,
    pub address_line5: Option<String>,
    pub postcode: Option<String>,
    pub current_posting: Option<String>,
    pub current_posting_effective_from_date: Option<String>,
    pub date_of_death: Option<String>,
    pub death_status: Option<DeathStatus>,
    pub telephone_number_home: Option<String>,
    pub telephone_number_mobile: Option<String>,
    pub email_address_home: Option<String>,
    pub preferred_language: Option<String>,
    pub interpreter_required: bool,
    pub reason_for_removal: Option<String>,
    pub reason_for_removal_effective_from_date: Option<String>,
}

impl Demographics {
    /// Address lines in order, for rules that look at the address as a whole
    pub fn address_lines(&self) -> [Option<&str>; 5] {
        [
            self.address_line1.as_deref(),
            self.address_line2.as_deref(),
            self.address_line3.as_deref(),
            self.address_line4.as_deref(),
            self.address_line5.as_deref(),
        ]
    }
}

/// Candidate record from an inbound feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Participant {
    /// Raw subject key, validated by rule 9
    pub nhs_number: String,

    /// Raw superseding subject key, validated by rule 57
    pub superseded_by_nhs_number: Option<String>,

    /// Raw record type, validated by rule 8
    pub record_type: Option<String>,

    /// Screening service this record belongs to
    pub screening_name: Option<String>,

    #[serde(flatten)]
    pub demographics: Demographics,
}

impl Participant {
    /// Creates a new builder for constructing a Participant
    pub fn builder() -> ParticipantBuilder {
        ParticipantBuilder::default()
    }

    /// Parsed record type, if the raw value is recognised
    pub fn parsed_record_type(&self) -> Option<RecordType> {
        self.record_type.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Builder for constructing Participant instances
#[derive(Debug, Default)]
pub struct ParticipantBuilder {
    nhs_number: Option<String>,
    superseded_by_nhs_number: Option<String>,
    record_type: Option<String>,
    screening_name: Option<String>,
    demographics: Demographics,
}

impl ParticipantBuilder {
    /// Creates a new ParticipantBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw NHS number
    pub fn nhs_number(mut self, nhs_number: impl Into<String>) -> Self {
        self.nhs_number = Some(nhs_number.into());
        self
    }

    /// Sets the superseding NHS number
    pub fn superseded_by_nhs_number(mut self, nhs_number: impl Into<String>) -> Self {
        self.superseded_by_nhs_number = Some(nhs_number.into());
        self
    }

    /// Sets the record type
    pub fn record_type(mut self, record_type: RecordType) -> Self {
        self.record_type = Some(record_type.as_str().to_string());
        self
    }

    /// Sets an arbitrary raw record type
    pub fn raw_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = Some(record_type.into());
        self
    }

    /// Sets the screening service name
    pub fn screening_name(mut self, screening_name: impl Into<String>) -> Self {
        self.screening_name = Some(screening_name.into());
        self
    }

    /// Replaces the whole demographic payload
    pub fn demographics(mut self, demographics: Demographics) -> Self {
        self.demographics = demographics;
        self
    }

    /// Builds the Participant
    ///
    /// # Errors
    ///
    /// Returns an error if no NHS number was supplied
    pub fn build(self) -> Result<Participant, String> {
        let nhs_number = self.nhs_number.ok_or("nhs_number is required")?;

        Ok(Participant {
            nhs_number,
            superseded_by_nhs_number: self.superseded_by_nhs_number,
            record_type: self.record_type,
            screening_name: self.screening_name,
            demographics: self.demographics,
        })
    }
}

/// A record committed for distribution
///
/// `is_extracted = true` implies `request_id` is set and refers to a request
/// audit entry. Only the batch extractor changes those two fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortDistributionRecord {
    /// Surrogate id assigned by the store
    pub cohort_distribution_id: i64,

    /// Upstream participant id, when known
    pub participant_id: Option<i64>,

    pub nhs_number: NhsNumber,

    pub superseded_nhs_number: Option<NhsNumber>,

    pub screening_name: Option<String>,

    #[serde(flatten)]
    pub demographics: Demographics,

    /// Set when a non-fatal exception was logged for this commit
    pub exception_flag: bool,

    pub is_extracted: bool,

    pub request_id: Option<RequestId>,

    pub record_insert_datetime: DateTime<Utc>,

    pub record_update_datetime: Option<DateTime<Utc>>,
}

impl CohortDistributionRecord {
    /// Builds an uncommitted record from a validated participant
    ///
    /// The surrogate id is zero until the store assigns one.
    pub fn from_participant(
        participant: &Participant,
        nhs_number: NhsNumber,
        exception_flag: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let superseded_nhs_number = participant
            .superseded_by_nhs_number
            .as_deref()
            .and_then(|s| NhsNumber::new(s).ok());

        Self {
            cohort_distribution_id: 0,
            participant_id: None,
            nhs_number,
            superseded_nhs_number,
            screening_name: participant.screening_name.clone(),
            demographics: participant.demographics.clone(),
            exception_flag,
            is_extracted: false,
            request_id: None,
            record_insert_datetime: now,
            record_update_datetime: None,
        }
    }

    /// Ordering key used for fair selection: last update, else insertion
    pub fn selection_time(&self) -> DateTime<Utc> {
        self.record_update_datetime
            .unwrap_or(self.record_insert_datetime)
    }

    /// Marks the record as handed out under `request_id`
    pub fn mark_extracted(&mut self, request_id: RequestId) {
        self.is_extracted = true;
        self.request_id = Some(request_id);
    }
}
