//! Prelude for the rule evaluation toolkit
//!
//! Re-exports the types needed to declare rules and evaluate them, so a
//! caller can `use netdeploy::functional::prelude::*;` and start composing.

pub use crate::functional::request::Request;
pub use crate::functional::rule::{
    field_check, field_numeric, field_positive, field_present, field_string,
    optional_field_check, Rule,
};
pub use crate::functional::rule_engine::{
    EngineConfig, EvaluationPolicy, Outcome, RuleEngine, RuleSet,
};
pub use crate::functional::rule_spec::{compile_all, RuleSpec};
pub use crate::functional::validation_rules::{
    all, any, not, when, Custom, Failure, Length, MacAddressFormat, Numeric, OneOf, Pattern,
    Positive, Range, Required, RuleResult, ValidationRule,
};

/// Builds a rule set from `(field, ValidationRule)` pairs, each checked with
/// [`field_check`] in the given order.
///
/// # Examples
///
/// ```
/// let check: Box<dyn ValidationRule<serde_json::Value> + Send + Sync> = Box::new(MacAddressFormat);
/// let rules = field_rule_set(vec![("macAddress", check)]);
/// assert_eq!(rules.len(), 1);
/// ```
pub fn field_rule_set(
    checks: Vec<(&str, Box<dyn ValidationRule<serde_json::Value> + Send + Sync>)>,
) -> RuleSet<serde_json::Value> {
    checks
        .into_iter()
        .map(|(field, check)| field_check(field, check))
        .collect()
}
