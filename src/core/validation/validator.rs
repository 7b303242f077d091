//! Rule validator
//!
//! Runs every registered rule in ascending id order and classifies what
//! fired. Evaluation is pure; nothing here touches a store.

use super::rules::{registry, Rule, RuleContext, INTERNAL_ERROR_DESCRIPTION, INTERNAL_ERROR_RULE_ID};
use crate::domain::{CohortDistributionRecord, Participant};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

/// A rule that fired
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: u16,
    pub description: String,
    pub is_fatal: bool,
}

impl Violation {
    fn from_rule(rule: &Rule) -> Self {
        Self {
            rule_id: rule.id,
            description: rule.description(),
            is_fatal: rule.is_fatal(),
        }
    }

    fn internal_error() -> Self {
        Self {
            rule_id: INTERNAL_ERROR_RULE_ID,
            description: INTERNAL_ERROR_DESCRIPTION.to_string(),
            is_fatal: true,
        }
    }
}

/// A rule that could not be evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule_id: u16,
    pub message: String,
}

/// Result of validating one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Violations in rule id order
    pub violations: Vec<Violation>,
    /// True when no fatal violation fired
    pub passed: bool,
    /// Rules that errored; each also appears as a rule 0 violation
    pub internal_errors: Vec<RuleFailure>,
}

impl ValidationOutcome {
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn fatal(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_fatal)
    }

    pub fn non_fatal(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_fatal)
    }
}

/// Evaluates a rule table against candidates
#[derive(Debug, Clone, Copy)]
pub struct RuleValidator {
    rules: &'static [Rule],
}

impl Default for RuleValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleValidator {
    /// Validator over the full business rule registry
    pub fn new() -> Self {
        Self::with_rules(registry())
    }

    /// Validator over another rule table, which must be in ascending id order
    pub fn with_rules(rules: &'static [Rule]) -> Self {
        Self { rules }
    }

    /// Validate against today's date
    pub fn validate(
        &self,
        candidate: &Participant,
        prior: Option<&CohortDistributionRecord>,
    ) -> ValidationOutcome {
        self.validate_at(candidate, prior, Utc::now().date_naive())
    }

    /// Validate with an explicit reference date for the date rules
    pub fn validate_at(
        &self,
        candidate: &Participant,
        prior: Option<&CohortDistributionRecord>,
        today: NaiveDate,
    ) -> ValidationOutcome {
        let ctx = RuleContext {
            candidate,
            prior,
            today,
        };
        let mut outcome = ValidationOutcome::default();

        for rule in self.rules {
            match rule.evaluate(&ctx) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(rule_id = rule.id, rule = rule.name, "Rule fired");
                    outcome.violations.push(Violation::from_rule(rule));
                    if rule.short_circuit {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(rule_id = rule.id, error = %err, "Rule failed to evaluate");
                    outcome.internal_errors.push(RuleFailure {
                        rule_id: rule.id,
                        message: err.0,
                    });
                    if !outcome
                        .violations
                        .iter()
                        .any(|v| v.rule_id == INTERNAL_ERROR_RULE_ID)
                    {
                        outcome.violations.push(Violation::internal_error());
                    }
                }
            }
        }

        outcome.passed = !outcome.violations.iter().any(|v| v.is_fatal);
        outcome
    }
}
