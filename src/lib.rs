//! Network deployment registry built on a functional rule evaluator.
//!
//! The [`functional`] module holds the reusable core: immutable requests,
//! composable rules and the [`RuleEngine`](functional::rule_engine::RuleEngine)
//! with its short-circuit and accumulate policies. The remaining modules put
//! that core to work behind an actix-web API.

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod functional;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;
