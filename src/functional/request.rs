//! Immutable request payload
//!
//! A [`Request`] is a read-only mapping from field name to raw JSON value.
//! It is backed by a persistent map, so "adding" a field produces a new
//! request that shares structure with the original instead of mutating it.

use im::OrdMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::functional::validation_rules::{Failure, RuleResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Request {
    fields: OrdMap<String, Value>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a request from a JSON body, which must be an object.
    ///
    /// # Examples
    ///
    /// ```
    /// let request = Request::from_json(json!({ "amount": -5 })).unwrap();
    /// assert_eq!(request.get("amount"), Some(&json!(-5)));
    /// assert!(Request::from_json(json!([1, 2])).is_err());
    /// ```
    pub fn from_json(body: Value) -> RuleResult<Self> {
        match body {
            Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(Failure::general(
                "INVALID_REQUEST",
                "request body must be a JSON object",
            )),
        }
    }

    /// Returns a new request with `name` set to `value`; `self` is untouched.
    pub fn with_field(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            fields: self.fields.update(name.into(), value.into()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field value, treating an explicit `null` the same as an absent field.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).filter(|value| !value.is_null())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        )
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Request {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}
