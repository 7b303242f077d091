//! Business rule registry
//!
//! Each rule is a pure predicate over the candidate record and, for the
//! cross-record rules, the most recent stored version of the same subject.
//! A predicate returns `Ok(true)` when the record satisfies the rule.
//!
//! The registry is a static table in ascending id order; the validator
//! relies on that order.

use super::dates::is_valid_past_date;
use crate::domain::{CohortDistributionRecord, DeathStatus, NhsNumber, Participant, RecordType};
use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Rule id reserved for failures inside the rule engine itself
pub const INTERNAL_ERROR_RULE_ID: u16 = 0;

/// Description logged for internal rule failures
pub const INTERNAL_ERROR_DESCRIPTION: &str = "0.InternalError.Fatal";

/// An unexpected failure while evaluating a rule
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct RuleError(pub String);

/// Everything a predicate may look at
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub candidate: &'a Participant,
    /// Most recent stored version of the same subject, if any
    pub prior: Option<&'a CohortDistributionRecord>,
    /// Reference date for "not in the future" checks
    pub today: NaiveDate,
}

impl RuleContext<'_> {
    fn record_type(&self) -> Option<RecordType> {
        self.candidate.parsed_record_type()
    }
}

/// Severity of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Blocks the record from being committed
    Fatal,
    /// Logged; the record is still committed with its exception flag set
    NonFatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Fatal => "Fatal",
            Severity::NonFatal => "NonFatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type RulePredicate = fn(&RuleContext<'_>) -> Result<bool, RuleError>;

/// A registered rule
pub struct Rule {
    pub id: u16,
    pub name: &'static str,
    pub severity: Severity,
    /// Stop evaluating later rules when this one fires
    pub short_circuit: bool,
    predicate: RulePredicate,
}

impl Rule {
    pub const fn new(
        id: u16,
        name: &'static str,
        severity: Severity,
        short_circuit: bool,
        predicate: RulePredicate,
    ) -> Self {
        Self {
            id,
            name,
            severity,
            short_circuit,
            predicate,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Exception log description, e.g. `9.NhsNumber.Fatal`
    pub fn description(&self) -> String {
        format!("{}.{}.{}", self.id, self.name, self.severity)
    }

    /// Evaluate the rule; `Ok(true)` means the record passes
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
        (self.predicate)(ctx)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("short_circuit", &self.short_circuit)
            .finish()
    }
}

static RULES: [Rule; 17] = [
    Rule::new(
        3,
        "PrimaryCareProviderAndReasonForRemoval",
        Severity::NonFatal,
        false,
        primary_care_provider_xor_reason_for_removal,
    ),
    Rule::new(8, "RecordType", Severity::NonFatal, false, record_type_is_known),
    Rule::new(9, "NhsNumber", Severity::Fatal, true, nhs_number_is_valid),
    Rule::new(
        14,
        "ReasonForRemoval",
        Severity::NonFatal,
        false,
        reason_for_removal_is_known,
    ),
    Rule::new(17, "DateOfBirth", Severity::NonFatal, false, date_of_birth_is_valid),
    Rule::new(18, "DateOfDeath", Severity::NonFatal, false, date_of_death_is_valid),
    Rule::new(
        19,
        "ReasonForRemovalEffectiveFromDate",
        Severity::NonFatal,
        false,
        reason_for_removal_date_is_valid,
    ),
    Rule::new(
        22,
        "ParticipantMustExist",
        Severity::Fatal,
        false,
        amendment_has_prior_version,
    ),
    Rule::new(30, "Postcode", Severity::NonFatal, false, postcode_is_valid),
    Rule::new(
        35,
        "TooManyDemographicsFieldsChanged",
        Severity::NonFatal,
        false,
        amendment_changes_few_demographics,
    ),
    Rule::new(39, "FamilyName", Severity::NonFatal, false, new_participant_has_family_name),
    Rule::new(40, "GivenName", Severity::NonFatal, false, new_participant_has_given_name),
    Rule::new(42, "GPPracticeCode", Severity::NonFatal, false, new_participant_has_gp_practice),
    Rule::new(
        47,
        "ParticipantMustNotExist",
        Severity::Fatal,
        false,
        new_participant_has_no_prior_version,
    ),
    Rule::new(
        57,
        "SupersededByNhsNumber",
        Severity::NonFatal,
        false,
        superseded_by_nhs_number_is_valid,
    ),
    Rule::new(66, "DeathStatus", Severity::NonFatal, false, formal_death_has_reason_dea),
    Rule::new(
        71,
        "NewParticipantWithNoAddress",
        Severity::NonFatal,
        false,
        new_participant_has_address,
    ),
];

/// All registered rules, in ascending id order
pub fn registry() -> &'static [Rule] {
    &RULES
}

/// Look up a rule by id
pub fn find(id: u16) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.id == id)
}

const REASONS_FOR_REMOVAL: [&str; 18] = [
    "AFL", "AFN", "CGA", "DEA", "DIS", "EMB", "LDN", "NIT", "OPA", "ORR", "RDI", "RDR", "RFI",
    "RPR", "SCT", "SDL", "SDN", "TRA",
];

static POSTCODE_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r"^([A-Za-z][A-Ha-hJ-Yj-y]?[0-9][A-Za-z0-9]? ?[0-9][A-Za-z]{2}|[Gg][Ii][Rr] ?0[Aa]{2})$",
    )
});

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn is_present(value: &Option<String>) -> bool {
    present(value.as_deref()).is_some()
}

fn primary_care_provider_xor_reason_for_removal(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    let d = &ctx.candidate.demographics;
    Ok(is_present(&d.primary_care_provider) != is_present(&d.reason_for_removal))
}

fn record_type_is_known(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(ctx.record_type().is_some())
}

fn nhs_number_is_valid(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(NhsNumber::is_valid(ctx.candidate.nhs_number.trim()))
}

fn reason_for_removal_is_known(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(
        match present(ctx.candidate.demographics.reason_for_removal.as_deref()) {
            None => true,
            Some(reason) => REASONS_FOR_REMOVAL.contains(&reason),
        },
    )
}

fn date_of_birth_is_valid(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(
        match present(ctx.candidate.demographics.date_of_birth.as_deref()) {
            None => false,
            Some(date) => is_valid_past_date(date, ctx.today),
        },
    )
}

fn optional_past_date(value: Option<&str>, today: NaiveDate) -> bool {
    match present(value) {
        None => true,
        Some(date) => is_valid_past_date(date, today),
    }
}

fn date_of_death_is_valid(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(optional_past_date(
        ctx.candidate.demographics.date_of_death.as_deref(),
        ctx.today,
    ))
}

fn reason_for_removal_date_is_valid(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(optional_past_date(
        ctx.candidate
            .demographics
            .reason_for_removal_effective_from_date
            .as_deref(),
        ctx.today,
    ))
}

fn amendment_has_prior_version(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(ctx.record_type() != Some(RecordType::Amended) || ctx.prior.is_some())
}

fn postcode_is_valid(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    let Some(postcode) = present(ctx.candidate.demographics.postcode.as_deref()) else {
        return Ok(true);
    };
    let pattern = POSTCODE_PATTERN
        .as_ref()
        .map_err(|e| RuleError(format!("postcode pattern failed to compile: {}", e)))?;
    Ok(pattern.is_match(postcode))
}

fn amendment_changes_few_demographics(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    if ctx.record_type() != Some(RecordType::Amended) {
        return Ok(true);
    }
    let Some(prior) = ctx.prior else {
        return Ok(true);
    };

    let new = &ctx.candidate.demographics;
    let old = &prior.demographics;
    let normalise = |v: &Option<String>| present(v.as_deref()).map(str::to_uppercase);

    let changed = [
        normalise(&new.family_name) != normalise(&old.family_name),
        new.gender != old.gender,
        normalise(&new.date_of_birth) != normalise(&old.date_of_birth),
    ]
    .iter()
    .filter(|changed| **changed)
    .count();

    Ok(changed < 2)
}

fn new_participant_requires(ctx: &RuleContext<'_>, value: &Option<String>) -> bool {
    ctx.record_type() != Some(RecordType::Add) || is_present(value)
}

fn new_participant_has_family_name(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(new_participant_requires(
        ctx,
        &ctx.candidate.demographics.family_name,
    ))
}

fn new_participant_has_given_name(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(new_participant_requires(ctx, &ctx.candidate.demographics.given_name))
}

fn new_participant_has_gp_practice(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(new_participant_requires(
        ctx,
        &ctx.candidate.demographics.primary_care_provider,
    ))
}

fn new_participant_has_no_prior_version(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(ctx.record_type() != Some(RecordType::Add) || ctx.prior.is_none())
}

fn superseded_by_nhs_number_is_valid(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    Ok(
        match present(ctx.candidate.superseded_by_nhs_number.as_deref()) {
            None => true,
            Some(superseded) => {
                NhsNumber::is_valid(superseded) && superseded != ctx.candidate.nhs_number.trim()
            }
        },
    )
}

fn formal_death_has_reason_dea(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    let d = &ctx.candidate.demographics;
    Ok(d.death_status != Some(DeathStatus::Formal)
        || present(d.reason_for_removal.as_deref()) == Some("DEA"))
}

fn new_participant_has_address(ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    if ctx.record_type() != Some(RecordType::Add) {
        return Ok(true);
    }
    let d = &ctx.candidate.demographics;
    let any_line = d.address_lines().iter().any(|line| present(*line).is_some());
    Ok(any_line || is_present(&d.postcode))
}
