//! Rule Evaluation Engine
//!
//! Applies an ordered [`RuleSet`] to a [`Request`] and folds the per-rule
//! results into an [`Outcome`]. Two policies are supported:
//!
//! - [`EvaluationPolicy::ShortCircuit`] stops at the first failure; rules
//!   declared after it never run.
//! - [`EvaluationPolicy::Accumulate`] runs every rule exactly once and
//!   collects every failure in declaration order.
//!
//! Evaluation is a pure function of the request and the rule set. Rule sets
//! are immutable and `Send + Sync`, so one set can be shared by any number of
//! concurrent callers.

use std::fmt;
use std::str::FromStr;

use itertools::{Either, Itertools};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::functional::request::Request;
use crate::functional::rule::Rule;
use crate::functional::validation_rules::{Failure, RuleResult};

/// How failures influence the rest of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPolicy {
    /// Stop at the first failure
    #[default]
    ShortCircuit,
    /// Run every rule and collect all failures
    Accumulate,
}

impl EvaluationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationPolicy::ShortCircuit => "short_circuit",
            EvaluationPolicy::Accumulate => "accumulate",
        }
    }
}

impl fmt::Display for EvaluationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown evaluation policy '{0}', expected 'short_circuit' or 'accumulate'")]
pub struct UnknownPolicy(pub String);

impl FromStr for EvaluationPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "short_circuit" | "fail_fast" => Ok(EvaluationPolicy::ShortCircuit),
            "accumulate" | "collect" => Ok(EvaluationPolicy::Accumulate),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Rule engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Policy used by [`RuleEngine::evaluate`]
    pub policy: EvaluationPolicy,
    /// Evaluate batches on the rayon pool when the `functional` feature is on
    pub parallel_batch: bool,
}

impl Default for EngineConfig {
    /// Short-circuit evaluation with parallel batches.
    fn default() -> Self {
        Self {
            policy: EvaluationPolicy::ShortCircuit,
            parallel_batch: true,
        }
    }
}

/// Aggregate result of evaluating a rule set against one request.
///
/// The failure list of [`Outcome::Failure`] is never empty and keeps the
/// order in which the failing rules were declared.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Outcome<T> {
    Success(T),
    Failure(Vec<Failure>),
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    /// Failed outcome with a single failure.
    pub fn failure(failure: Failure) -> Self {
        Outcome::Failure(vec![failure])
    }

    /// Failed outcome from a list of failures. An empty list is a
    /// programming error.
    pub fn failures_from(failures: Vec<Failure>) -> Self {
        debug_assert!(!failures.is_empty(), "a failed outcome needs a failure");
        Outcome::Failure(failures)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failures(&self) -> &[Failure] {
        match self {
            Outcome::Success(_) => &[],
            Outcome::Failure(failures) => failures,
        }
    }

    pub fn into_result(self) -> Result<T, Vec<Failure>> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(failures) => Err(failures),
        }
    }

    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(failures) => Outcome::Failure(failures),
        }
    }

    pub fn and_then<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> Outcome<U>,
    {
        match self {
            Outcome::Success(value) => f(value),
            Outcome::Failure(failures) => Outcome::Failure(failures),
        }
    }

    /// Pairs two outcomes, accumulating the failures of both sides
    /// (`self` first).
    pub fn zip<U>(self, other: Outcome<U>) -> Outcome<(T, U)> {
        match (self, other) {
            (Outcome::Success(left), Outcome::Success(right)) => Outcome::Success((left, right)),
            (Outcome::Failure(mut left), Outcome::Failure(right)) => {
                left.extend(right);
                Outcome::Failure(left)
            }
            (Outcome::Failure(failures), _) | (_, Outcome::Failure(failures)) => {
                Outcome::Failure(failures)
            }
        }
    }
}

impl<T> Outcome<Vec<T>> {
    /// Folds many outcomes into one. Succeeds with every value only when all
    /// inputs succeeded; otherwise carries every failure, in input order.
    pub fn combine<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = Outcome<T>>,
    {
        outcomes
            .into_iter()
            .fold(Outcome::Success(Vec::new()), |acc, next| {
                acc.zip(next).map(|(mut values, value)| {
                    values.push(value);
                    values
                })
            })
    }
}

impl<T> From<RuleResult<T>> for Outcome<T> {
    fn from(result: RuleResult<T>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(failure) => Outcome::failure(failure),
        }
    }
}

/// Ordered, immutable collection of rules sharing a success type.
pub struct RuleSet<T> {
    rules: Vec<Rule<T>>,
}

impl<T> Clone for RuleSet<T> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
        }
    }
}

impl<T> fmt::Debug for RuleSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<T> RuleSet<T> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule; rules run in the order they are added
    pub fn rule(mut self, rule: Rule<T>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule<T>> {
        self.rules.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.name())
    }
}

impl<T> Default for RuleSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<Rule<T>> for RuleSet<T> {
    fn from_iter<I: IntoIterator<Item = Rule<T>>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

/// Rule evaluation engine
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    config: EngineConfig,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn with_policy(policy: EvaluationPolicy) -> Self {
        Self::with_config(EngineConfig {
            policy,
            ..EngineConfig::default()
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn policy(&self) -> EvaluationPolicy {
        self.config.policy
    }

    /// Evaluate `rules` against `request` with the configured policy.
    ///
    /// On success the outcome holds every rule's value in declaration order;
    /// the last element is the final success value. An empty rule set
    /// succeeds with an empty list.
    pub fn evaluate<T>(&self, request: &Request, rules: &RuleSet<T>) -> Outcome<Vec<T>> {
        self.evaluate_with(request, rules, self.config.policy)
    }

    /// Evaluate with an explicit policy, ignoring the configured one.
    pub fn evaluate_with<T>(
        &self,
        request: &Request,
        rules: &RuleSet<T>,
        policy: EvaluationPolicy,
    ) -> Outcome<Vec<T>> {
        let outcome = match policy {
            EvaluationPolicy::ShortCircuit => short_circuit(request, rules),
            EvaluationPolicy::Accumulate => accumulate(request, rules),
        };

        tracing::debug!(
            policy = %policy,
            rules = rules.len(),
            failures = outcome.failures().len(),
            "rule set evaluated"
        );
        outcome
    }

    /// Evaluate many independent requests against one shared rule set.
    /// Outcomes are returned in input order.
    pub fn evaluate_batch<T: Send>(
        &self,
        requests: &[Request],
        rules: &RuleSet<T>,
    ) -> Vec<Outcome<Vec<T>>> {
        #[cfg(feature = "functional")]
        {
            if self.config.parallel_batch {
                use rayon::prelude::*;

                return requests
                    .par_iter()
                    .map(|request| self.evaluate(request, rules))
                    .collect();
            }
        }

        requests
            .iter()
            .map(|request| self.evaluate(request, rules))
            .collect()
    }
}

fn short_circuit<T>(request: &Request, rules: &RuleSet<T>) -> Outcome<Vec<T>> {
    // `collect` into a `Result` stops pulling from the iterator at the first `Err`.
    rules
        .iter()
        .map(|rule| {
            rule.apply(request).inspect_err(|failure| {
                tracing::debug!(rule = rule.name(), code = %failure.code, "rule failed, stopping");
            })
        })
        .collect::<RuleResult<Vec<T>>>()
        .into()
}

fn accumulate<T>(request: &Request, rules: &RuleSet<T>) -> Outcome<Vec<T>> {
    let (values, failures): (Vec<T>, Vec<Failure>) =
        rules
            .iter()
            .map(|rule| rule.apply(request))
            .partition_map(|result| match result {
                Ok(value) => Either::Left(value),
                Err(failure) => Either::Right(failure),
            });

    if failures.is_empty() {
        Outcome::Success(values)
    } else {
        Outcome::failures_from(failures)
    }
}
