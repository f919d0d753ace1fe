use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::borrow::Cow;

use crate::{
    constants,
    error::ServiceError,
    functional::{
        request::Request,
        response_transformers::ResponseTransformer,
        rule_engine::{EvaluationPolicy, RuleEngine},
        rule_spec::{compile_all, RuleSpec},
    },
    services::functional_service_base::FunctionalErrorHandling,
};

/// Body of `POST /api/v1/rules/evaluate`.
#[derive(Debug, Deserialize)]
pub struct EvaluationRequest {
    /// Falls back to the engine's configured policy
    #[serde(default)]
    pub policy: Option<EvaluationPolicy>,
    pub request: Value,
    pub rules: Vec<RuleSpec>,
}

/// Evaluates ad-hoc declarative rules against a request.
///
/// Answers 200 with the [`Outcome`](crate::functional::rule_engine::Outcome)
/// whether the rules passed or not; 400 only for a malformed request or
/// invalid rule specs.
pub async fn evaluate(
    body: web::Json<EvaluationRequest>,
    engine: web::Data<RuleEngine>,
    req: HttpRequest,
) -> Result<HttpResponse, ServiceError> {
    let EvaluationRequest {
        policy,
        request,
        rules,
    } = body.into_inner();

    let request = Request::from_json(request)?;
    let rules = compile_all(&rules)
        .into_result()
        .map_err(|failures| ServiceError::validation(failures).with_tag("rules"))
        .log_error("evaluation_controller::evaluate")?;

    let policy = policy.unwrap_or_else(|| engine.policy());
    let outcome = engine.evaluate_with(&request, &rules, policy);
    let names: Vec<&str> = rules.names().collect();

    Ok(ResponseTransformer::new(outcome)
        .with_message(Cow::Borrowed(constants::MESSAGE_RULES_EVALUATED))
        .with_metadata_value(json!({ "policy": policy, "rules": names }))
        .respond_to(&req))
}
