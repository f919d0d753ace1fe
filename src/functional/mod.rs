//! Functional building blocks: immutable requests, composable rules and the
//! rule evaluation engine.

pub mod prelude;
pub mod request;
pub mod response_transformers;
pub mod rule;
pub mod rule_engine;
pub mod rule_spec;
pub mod validation_rules;
