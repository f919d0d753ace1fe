use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::{
    error::ServiceError,
    functional::{
        request::Request,
        rule::{field_check, optional_field_check},
        rule_engine::{EvaluationPolicy, Outcome, RuleEngine, RuleSet},
        validation_rules::{MacAddressFormat, OneOf},
    },
    models::device::{DeviceType, RegisterDevice},
};

pub const DEVICE_TYPE: &str = "deviceType";
pub const MAC_ADDRESS: &str = "macAddress";
pub const UPLINK_MAC_ADDRESS: &str = "uplinkMacAddress";

/// Shape rules for a registration payload: a known device type, a well
/// formed MAC address and, when given, a well formed uplink MAC address.
pub fn register_payload_rules() -> &'static RuleSet<Value> {
    static RULES: OnceCell<RuleSet<Value>> = OnceCell::new();
    RULES.get_or_init(|| {
        let kinds = DeviceType::ALL
            .iter()
            .map(|kind| Value::from(kind.as_str()))
            .collect();

        RuleSet::new()
            .rule(field_check(DEVICE_TYPE, OneOf::new(kinds)))
            .rule(field_check(MAC_ADDRESS, MacAddressFormat))
            .rule(
                optional_field_check(UPLINK_MAC_ADDRESS, MacAddressFormat)
                    .map(|uplink| uplink.unwrap_or(Value::Null)),
            )
    })
}

/// Validates a registration payload, reporting every shape problem at once.
pub fn validate_register(
    engine: &RuleEngine,
    payload: &Request,
) -> Result<RegisterDevice, ServiceError> {
    let outcome =
        engine.evaluate_with(payload, register_payload_rules(), EvaluationPolicy::Accumulate);

    match outcome {
        Outcome::Success(_) => serde_json::from_value(payload.to_json()).map_err(|e| {
            ServiceError::bad_request(e.to_string())
                .with_tag("device")
                .with_detail("registration payload did not deserialize after validation")
        }),
        Outcome::Failure(failures) => Err(ServiceError::validation(failures).with_tag("device")),
    }
}
