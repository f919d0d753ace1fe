//! Request-level Rules
//!
//! A [`Rule`] is a named, pure function from a [`Request`] to a
//! [`RuleResult`]. Rules are built from closures and composed with explicit
//! combinators (`map`, `and_then`, `or_else`) so every rule can be exercised
//! on its own. They are cheap to clone and safe to share between threads.

use std::sync::Arc;

use serde_json::Value;

use crate::functional::request::Request;
use crate::functional::validation_rules::{
    as_number, Failure, Positive, RuleResult, ValidationRule,
};

type RuleFn<T> = dyn Fn(&Request) -> RuleResult<T> + Send + Sync;

pub struct Rule<T> {
    name: Arc<str>,
    run: Arc<RuleFn<T>>,
}

impl<T> Clone for Rule<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            run: Arc::clone(&self.run),
        }
    }
}

impl<T> std::fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

impl<T> Rule<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the rule against a request
    pub fn apply(&self, request: &Request) -> RuleResult<T> {
        (self.run)(request)
    }
}

impl<T: 'static> Rule<T> {
    /// Create a new rule from a function
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Request) -> RuleResult<T> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            run: Arc::new(f),
        }
    }

    /// Map the success value of this rule
    pub fn map<U, F>(self, f: F) -> Rule<U>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
        U: 'static,
    {
        let name = Arc::clone(&self.name);
        Rule {
            name,
            run: Arc::new(move |request: &Request| self.apply(request).map(&f)),
        }
    }

    /// Chain a fallible step that only runs when this rule succeeded
    pub fn and_then<U, F>(self, f: F) -> Rule<U>
    where
        F: Fn(T) -> RuleResult<U> + Send + Sync + 'static,
        U: 'static,
    {
        let name = Arc::clone(&self.name);
        Rule {
            name,
            run: Arc::new(move |request: &Request| self.apply(request).and_then(&f)),
        }
    }

    /// Recover from a failure of this rule
    pub fn or_else<F>(self, f: F) -> Rule<T>
    where
        F: Fn(Failure) -> RuleResult<T> + Send + Sync + 'static,
    {
        let name = Arc::clone(&self.name);
        Rule {
            name,
            run: Arc::new(move |request: &Request| self.apply(request).or_else(&f)),
        }
    }

    /// Run a value-level check on the success value, keeping the value
    pub fn check<V>(self, field: impl Into<String>, check: V) -> Rule<T>
    where
        V: ValidationRule<T> + Send + Sync + 'static,
    {
        let field = field.into();
        self.and_then(move |value| check.validate(&value, &field).map(|_| value))
    }

    /// Combine two rules into one that yields both values, stopping at the
    /// first failure.
    pub fn zip<U: 'static>(self, other: Rule<U>) -> Rule<(T, U)> {
        let name = format!("{} & {}", self.name, other.name);
        Rule::new(name, move |request: &Request| {
            let first = self.apply(request)?;
            let second = other.apply(request)?;
            Ok((first, second))
        })
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            run: self.run,
        }
    }
}

fn missing(field: &str) -> Failure {
    Failure::new(field, "REQUIRED", format!("{} is required", field))
}

/// Field must be present and not `null`; succeeds with the raw value.
pub fn field_present(field: &str) -> Rule<Value> {
    let field = field.to_string();
    Rule::new(format!("{} present", field), move |request: &Request| {
        request.value(&field).cloned().ok_or_else(|| missing(&field))
    })
}

/// Field must hold a number (or numeric string); succeeds with the number.
pub fn field_numeric(field: &str) -> Rule<f64> {
    let field = field.to_string();
    Rule::new(format!("{} numeric", field), move |request: &Request| {
        let value = request.value(&field).ok_or_else(|| missing(&field))?;
        as_number(value).ok_or_else(|| {
            Failure::new(&field, "NOT_NUMERIC", format!("{} must be numeric", field))
        })
    })
}

/// Field must hold a number strictly greater than zero.
pub fn field_positive(field: &str) -> Rule<f64> {
    field_numeric(field)
        .check(field, Positive)
        .named(format!("{} positive", field))
}

/// Field must be a string; succeeds with the text.
pub fn field_string(field: &str) -> Rule<String> {
    let field = field.to_string();
    Rule::new(format!("{} string", field), move |request: &Request| {
        match request.value(&field) {
            None => Err(missing(&field)),
            Some(Value::String(text)) => Ok(text.clone()),
            Some(_) => Err(Failure::new(
                &field,
                "NOT_A_STRING",
                format!("{} must be a string", field),
            )),
        }
    })
}

/// Field must be present and pass `check`; succeeds with the raw value.
pub fn field_check<V>(field: &str, check: V) -> Rule<Value>
where
    V: ValidationRule<Value> + Send + Sync + 'static,
{
    field_present(field)
        .check(field, check)
        .named(format!("{} valid", field))
}

/// Absent or `null` passes with `None`; otherwise the value must pass `check`.
pub fn optional_field_check<V>(field: &str, check: V) -> Rule<Option<Value>>
where
    V: ValidationRule<Value> + Send + Sync + 'static,
{
    let field = field.to_string();
    Rule::new(format!("{} valid if present", field), move |request: &Request| {
        match request.value(&field) {
            None => Ok(None),
            Some(value) => check.validate(value, &field).map(|_| Some(value.clone())),
        }
    })
}
