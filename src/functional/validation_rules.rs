//! Composable Validation Rules
//!
//! Value-level checks that know nothing about where a value came from. Each
//! check is a pure function returning a [`RuleResult`], so checks can be
//! chained with `?`, combined with [`all`], [`any`], [`not`] and [`when`], or
//! lifted into request-level rules (see [`crate::functional::rule`]).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

static MAC_ADDRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$").expect("MAC address regex is valid")
});

/// Result produced by every rule and check.
pub type RuleResult<T> = Result<T, Failure>;

/// Typed failure carrying a machine-readable code and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct Failure {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    pub code: String,
    pub message: String,
}

impl Failure {
    /// Creates a Failure with the provided field name, reason code, and message.
    ///
    /// # Examples
    ///
    /// ```
    /// let failure = Failure::new("amount", "NOT_POSITIVE", "amount must be positive");
    /// assert_eq!(failure.field, "amount");
    /// assert_eq!(failure.code, "NOT_POSITIVE");
    /// ```
    pub fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Failure that is not tied to a single field.
    pub fn general(code: &str, message: impl Into<String>) -> Self {
        Self::new("", code, message)
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = field.to_string();
        self
    }
}

/// Core value-level check.
pub trait ValidationRule<T: ?Sized> {
    fn validate(&self, value: &T, field_name: &str) -> RuleResult<()>;
}

impl<T: ?Sized, R: ValidationRule<T> + ?Sized> ValidationRule<T> for Box<R> {
    fn validate(&self, value: &T, field_name: &str) -> RuleResult<()> {
        (**self).validate(value, field_name)
    }
}

impl<T: ?Sized, R: ValidationRule<T> + ?Sized> ValidationRule<T> for Arc<R> {
    fn validate(&self, value: &T, field_name: &str) -> RuleResult<()> {
        (**self).validate(value, field_name)
    }
}

/// Reads a raw value as a number.
///
/// JSON numbers are taken as-is; strings are accepted when they parse to a
/// finite `f64` (raw request values frequently arrive as text).
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|parsed| parsed.is_finite()),
        _ => None,
    }
}

fn not_numeric(field_name: &str) -> Failure {
    Failure::new(
        field_name,
        "NOT_NUMERIC",
        format!("{} must be numeric", field_name),
    )
}

fn required(field_name: &str) -> Failure {
    Failure::new(
        field_name,
        "REQUIRED",
        format!("{} is required", field_name),
    )
}

/// Required value validation - rejects `null` and blank strings
pub struct Required;

impl ValidationRule<Value> for Required {
    /// Fails with code `REQUIRED` when the value is `null` or a string that is
    /// empty after trimming.
    ///
    /// # Examples
    ///
    /// ```
    /// let rule = Required;
    /// assert!(rule.validate(&json!("hello"), "greeting").is_ok());
    /// let err = rule.validate(&json!("  "), "greeting").unwrap_err();
    /// assert_eq!(err.message, "greeting is required");
    /// ```
    fn validate(&self, value: &Value, field_name: &str) -> RuleResult<()> {
        match value {
            Value::Null => Err(required(field_name)),
            Value::String(text) if text.trim().is_empty() => Err(required(field_name)),
            _ => Ok(()),
        }
    }
}

impl ValidationRule<str> for Required {
    fn validate(&self, value: &str, field_name: &str) -> RuleResult<()> {
        if value.trim().is_empty() {
            return Err(required(field_name));
        }
        Ok(())
    }
}

/// Numeric validation - number or numeric string
pub struct Numeric;

impl ValidationRule<Value> for Numeric {
    fn validate(&self, value: &Value, field_name: &str) -> RuleResult<()> {
        as_number(value).map(|_| ()).ok_or_else(|| not_numeric(field_name))
    }
}

/// Strictly positive number
pub struct Positive;

impl ValidationRule<f64> for Positive {
    fn validate(&self, value: &f64, field_name: &str) -> RuleResult<()> {
        if *value <= 0.0 {
            return Err(Failure::new(
                field_name,
                "NOT_POSITIVE",
                format!("{} must be positive", field_name),
            ));
        }
        Ok(())
    }
}

impl ValidationRule<Value> for Positive {
    fn validate(&self, value: &Value, field_name: &str) -> RuleResult<()> {
        let number = as_number(value).ok_or_else(|| not_numeric(field_name))?;
        ValidationRule::<f64>::validate(self, &number, field_name)
    }
}

/// Numeric range validation (inclusive bounds)
#[derive(Debug, Clone, Copy, Default)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValidationRule<f64> for Range {
    /// Validates that a number falls within the configured inclusive range.
    ///
    /// Returns `TOO_SMALL` below `min` and `TOO_LARGE` above `max`.
    ///
    /// # Examples
    ///
    /// ```
    /// let range = Range { min: Some(0.0), max: Some(10.0) };
    /// assert!(range.validate(&5.0, "count").is_ok());
    /// assert_eq!(range.validate(&-1.0, "count").unwrap_err().code, "TOO_SMALL");
    /// ```
    fn validate(&self, value: &f64, field_name: &str) -> RuleResult<()> {
        if let Some(min) = self.min {
            if *value < min {
                return Err(Failure::new(
                    field_name,
                    "TOO_SMALL",
                    format!("{} must be at least {}", field_name, min),
                ));
            }
        }

        if let Some(max) = self.max {
            if *value > max {
                return Err(Failure::new(
                    field_name,
                    "TOO_LARGE",
                    format!("{} must be at most {}", field_name, max),
                ));
            }
        }

        Ok(())
    }
}

impl ValidationRule<Value> for Range {
    fn validate(&self, value: &Value, field_name: &str) -> RuleResult<()> {
        let number = as_number(value).ok_or_else(|| not_numeric(field_name))?;
        ValidationRule::<f64>::validate(self, &number, field_name)
    }
}

/// String length validation, counted in characters
#[derive(Debug, Clone, Copy, Default)]
pub struct Length {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl ValidationRule<str> for Length {
    fn validate(&self, value: &str, field_name: &str) -> RuleResult<()> {
        let len = value.chars().count();

        if let Some(min) = self.min {
            if len < min {
                return Err(Failure::new(
                    field_name,
                    "TOO_SHORT",
                    format!("{} must be at least {} characters", field_name, min),
                ));
            }
        }

        if let Some(max) = self.max {
            if len > max {
                return Err(Failure::new(
                    field_name,
                    "TOO_LONG",
                    format!("{} must be at most {} characters", field_name, max),
                ));
            }
        }

        Ok(())
    }
}

impl ValidationRule<Value> for Length {
    fn validate(&self, value: &Value, field_name: &str) -> RuleResult<()> {
        let text = expect_str(value, field_name)?;
        ValidationRule::<str>::validate(self, text, field_name)
    }
}

fn expect_str<'a>(value: &'a Value, field_name: &str) -> RuleResult<&'a str> {
    value.as_str().ok_or_else(|| {
        Failure::new(
            field_name,
            "NOT_A_STRING",
            format!("{} must be a string", field_name),
        )
    })
}

/// Regex format validation
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(|regex| Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl ValidationRule<str> for Pattern {
    fn validate(&self, value: &str, field_name: &str) -> RuleResult<()> {
        if !self.regex.is_match(value) {
            return Err(Failure::new(
                field_name,
                "INVALID_FORMAT",
                format!("{} format is invalid", field_name),
            ));
        }
        Ok(())
    }
}

impl ValidationRule<Value> for Pattern {
    fn validate(&self, value: &Value, field_name: &str) -> RuleResult<()> {
        let text = expect_str(value, field_name)?;
        ValidationRule::<str>::validate(self, text, field_name)
    }
}

/// MAC address format validation: six hex octets separated by `:` or `-`
pub struct MacAddressFormat;

impl ValidationRule<str> for MacAddressFormat {
    /// # Examples
    ///
    /// ```
    /// let rule = MacAddressFormat;
    /// assert!(rule.validate("00:1A:2b:3C:4d:5E", "macAddress").is_ok());
    /// assert!(rule.validate("00:1A:2B:3C:4D", "macAddress").is_err());
    /// ```
    fn validate(&self, value: &str, field_name: &str) -> RuleResult<()> {
        if !MAC_ADDRESS_REGEX.is_match(value) {
            return Err(Failure::new(
                field_name,
                "INVALID_MAC_ADDRESS",
                format!("Invalid MAC address: '{}'", value),
            ));
        }
        Ok(())
    }
}

impl ValidationRule<Value> for MacAddressFormat {
    fn validate(&self, value: &Value, field_name: &str) -> RuleResult<()> {
        match value {
            Value::String(text) => ValidationRule::<str>::validate(self, text, field_name),
            other => Err(Failure::new(
                field_name,
                "INVALID_MAC_ADDRESS",
                format!("Invalid MAC address: '{}'", other),
            )),
        }
    }
}

/// Custom validation using a predicate function
pub struct Custom<F> {
    predicate: F,
    error_code: String,
    error_message: String,
}

impl<F> Custom<F> {
    /// Creates a predicate-based rule. `{}` in `error_message` is replaced by
    /// the field name when the predicate returns `false`.
    ///
    /// # Examples
    ///
    /// ```
    /// let rule = Custom::new(|v: &f64| *v > 0.0, "TOO_SMALL", "{} must be greater than 0");
    /// assert!(rule.validate(&5.0, "age").is_ok());
    /// assert!(rule.validate(&0.0, "age").is_err());
    /// ```
    pub fn new(predicate: F, error_code: &str, error_message: &str) -> Self {
        Self {
            predicate,
            error_code: error_code.to_string(),
            error_message: error_message.to_string(),
        }
    }
}

impl<F, T: ?Sized> ValidationRule<T> for Custom<F>
where
    F: Fn(&T) -> bool,
{
    fn validate(&self, value: &T, field_name: &str) -> RuleResult<()> {
        if !(self.predicate)(value) {
            return Err(Failure::new(
                field_name,
                &self.error_code,
                self.error_message.replace("{}", field_name),
            ));
        }
        Ok(())
    }
}

/// One-of validation for enums or allowed values
pub struct OneOf<T: Clone + PartialEq> {
    allowed_values: Vec<T>,
}

impl<T: Clone + PartialEq> OneOf<T> {
    pub fn new(allowed_values: Vec<T>) -> Self {
        Self { allowed_values }
    }

    pub fn allowed_values(&self) -> &[T] {
        &self.allowed_values
    }
}

impl<T: Clone + PartialEq> ValidationRule<T> for OneOf<T> {
    fn validate(&self, value: &T, field_name: &str) -> RuleResult<()> {
        if !self.allowed_values.contains(value) {
            return Err(Failure::new(
                field_name,
                "INVALID_VALUE",
                format!("{} must be one of the allowed values", field_name),
            ));
        }
        Ok(())
    }
}

/// Validator that succeeds only when all rules succeed
pub struct AllValidator<R> {
    rules: Vec<R>,
}

impl<T: ?Sized, R: ValidationRule<T>> ValidationRule<T> for AllValidator<R> {
    /// Applies each contained rule in sequence and propagates the first failure.
    fn validate(&self, value: &T, field_name: &str) -> RuleResult<()> {
        for rule in &self.rules {
            rule.validate(value, field_name)?;
        }
        Ok(())
    }
}

/// Constructs an [`AllValidator`] that applies every rule in `rules` in sequence.
///
/// # Examples
///
/// ```
/// let rule = all(vec![Length { min: Some(2), max: None }, Length { min: None, max: Some(10) }]);
/// assert!(rule.validate("hello", "name").is_ok());
/// assert!(rule.validate("a", "name").is_err());
/// ```
pub fn all<R>(rules: Vec<R>) -> AllValidator<R> {
    AllValidator { rules }
}

/// Validator that succeeds when at least one rule succeeds
pub struct AnyValidator<R> {
    rules: Vec<R>,
}

impl<T: ?Sized, R: ValidationRule<T>> ValidationRule<T> for AnyValidator<R> {
    /// Returns `NO_RULES_PROVIDED` for an empty rule list, and
    /// `ANY_VALIDATION_FAILED` with every inner message joined by `; ` when
    /// no rule passes.
    fn validate(&self, value: &T, field_name: &str) -> RuleResult<()> {
        let mut collected_errors = Vec::new();

        for rule in &self.rules {
            match rule.validate(value, field_name) {
                Ok(()) => return Ok(()),
                Err(error) => collected_errors.push(error),
            }
        }

        if collected_errors.is_empty() {
            Err(Failure::new(
                field_name,
                "NO_RULES_PROVIDED",
                "No validation rules provided",
            ))
        } else {
            let combined_message = itertools::join(collected_errors.iter().map(|e| &e.message), "; ");
            Err(Failure::new(
                field_name,
                "ANY_VALIDATION_FAILED",
                format!("All validation rules failed: {}", combined_message),
            ))
        }
    }
}

pub fn any<R>(rules: Vec<R>) -> AnyValidator<R> {
    AnyValidator { rules }
}

/// Validator that inverts another rule
pub struct NotValidator<R> {
    rule: R,
}

impl<T: ?Sized, R: ValidationRule<T>> ValidationRule<T> for NotValidator<R> {
    fn validate(&self, value: &T, field_name: &str) -> RuleResult<()> {
        match self.rule.validate(value, field_name) {
            Ok(()) => Err(Failure::new(
                field_name,
                "VALIDATION_FAILED",
                "Validation rule should have failed but passed",
            )),
            Err(_) => Ok(()),
        }
    }
}

pub fn not<R>(rule: R) -> NotValidator<R> {
    NotValidator { rule }
}

/// Validator that only runs its rule when a predicate holds
pub struct WhenValidator<C, R> {
    condition: C,
    rule: R,
}

impl<T: ?Sized, C, R> ValidationRule<T> for WhenValidator<C, R>
where
    C: Fn(&T) -> bool,
    R: ValidationRule<T>,
{
    fn validate(&self, value: &T, field_name: &str) -> RuleResult<()> {
        if (self.condition)(value) {
            self.rule.validate(value, field_name)
        } else {
            Ok(())
        }
    }
}

pub fn when<C, R>(condition: C, rule: R) -> WhenValidator<C, R> {
    WhenValidator { condition, rule }
}
