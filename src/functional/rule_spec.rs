//! Declarative rules
//!
//! [`RuleSpec`] is the serialisable description of a field rule, as accepted
//! by the `/api/v1/rules/evaluate` endpoint. Specs compile into ordinary
//! [`Rule<Value>`] instances; a malformed spec compiles into an
//! `INVALID_RULE` failure instead of a rule.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::functional::rule::{field_check, field_present, Rule};
use crate::functional::rule_engine::{Outcome, RuleSet};
use crate::functional::validation_rules::{
    Failure, Length, MacAddressFormat, Numeric, OneOf, Pattern, Positive, Range, RuleResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    Present {
        field: String,
    },
    Numeric {
        field: String,
    },
    Positive {
        field: String,
    },
    Range {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Length {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },
    Pattern {
        field: String,
        pattern: String,
    },
    MacAddress {
        field: String,
    },
    OneOf {
        field: String,
        values: Vec<Value>,
    },
}

fn invalid(field: &str, message: impl Into<String>) -> Failure {
    Failure::new(field, "INVALID_RULE", message)
}

impl RuleSpec {
    pub fn field(&self) -> &str {
        match self {
            RuleSpec::Present { field }
            | RuleSpec::Numeric { field }
            | RuleSpec::Positive { field }
            | RuleSpec::Range { field, .. }
            | RuleSpec::Length { field, .. }
            | RuleSpec::Pattern { field, .. }
            | RuleSpec::MacAddress { field }
            | RuleSpec::OneOf { field, .. } => field,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RuleSpec::Present { .. } => "present",
            RuleSpec::Numeric { .. } => "numeric",
            RuleSpec::Positive { .. } => "positive",
            RuleSpec::Range { .. } => "range",
            RuleSpec::Length { .. } => "length",
            RuleSpec::Pattern { .. } => "pattern",
            RuleSpec::MacAddress { .. } => "mac_address",
            RuleSpec::OneOf { .. } => "one_of",
        }
    }

    /// Compiles the spec into a rule named `"<field> <kind>"`.
    ///
    /// # Errors
    ///
    /// Returns an `INVALID_RULE` failure for a blank field name, inverted
    /// bounds, an unparsable pattern or an empty `one_of` list.
    pub fn compile(&self) -> RuleResult<Rule<Value>> {
        let field = self.field().trim();
        if field.is_empty() {
            return Err(invalid(
                "",
                format!("{} rule requires a field name", self.kind()),
            ));
        }

        let rule = match self {
            RuleSpec::Present { .. } => field_present(field),
            RuleSpec::Numeric { .. } => field_check(field, Numeric),
            RuleSpec::Positive { .. } => field_check(field, Positive),
            RuleSpec::Range { min, max, .. } => {
                if let (Some(min), Some(max)) = (min, max) {
                    if min > max {
                        return Err(invalid(
                            field,
                            format!("range for {} has min {} above max {}", field, min, max),
                        ));
                    }
                }
                field_check(
                    field,
                    Range {
                        min: *min,
                        max: *max,
                    },
                )
            }
            RuleSpec::Length { min, max, .. } => {
                if let (Some(min), Some(max)) = (min, max) {
                    if min > max {
                        return Err(invalid(
                            field,
                            format!("length for {} has min {} above max {}", field, min, max),
                        ));
                    }
                }
                field_check(
                    field,
                    Length {
                        min: *min,
                        max: *max,
                    },
                )
            }
            RuleSpec::Pattern { pattern, .. } => {
                let pattern = Pattern::new(pattern).map_err(|e| {
                    invalid(field, format!("pattern for {} is invalid: {}", field, e))
                })?;
                field_check(field, pattern)
            }
            RuleSpec::MacAddress { .. } => field_check(field, MacAddressFormat),
            RuleSpec::OneOf { values, .. } => {
                if values.is_empty() {
                    return Err(invalid(
                        field,
                        format!("one_of for {} needs at least one value", field),
                    ));
                }
                field_check(field, OneOf::new(values.clone()))
            }
        };

        Ok(rule.named(format!("{} {}", field, self.kind())))
    }
}

/// Compiles every spec, keeping declaration order. All invalid specs are
/// reported together.
pub fn compile_all(specs: &[RuleSpec]) -> Outcome<RuleSet<Value>> {
    Outcome::combine(specs.iter().map(|spec| Outcome::from(spec.compile())))
        .map(|rules| rules.into_iter().collect())
}
