//! Business rule validation
//!
//! - [`rules`] - Static rule registry
//! - [`validator`] - Evaluates the registry against a candidate record
//! - [`dates`] - Business date formats shared by the date rules

pub mod dates;
pub mod rules;
pub mod validator;

pub use rules::{registry, Rule, RuleContext, RuleError, Severity, INTERNAL_ERROR_RULE_ID};
pub use validator::{RuleFailure, RuleValidator, ValidationOutcome, Violation};
