//! Network Device Module
//!
//! Devices of a network deployment: their kinds, MAC addresses and the
//! descriptor and tree views served by the API.

pub mod validators;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::functional::request::Request;
use crate::functional::validation_rules::{
    Failure, MacAddressFormat, RuleResult, ValidationRule,
};

/// Kind of networking device. Declaration order is the listing precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    Gateway,
    Switch,
    AccessPoint,
}

impl DeviceType {
    pub const ALL: [DeviceType; 3] = [
        DeviceType::Gateway,
        DeviceType::Switch,
        DeviceType::AccessPoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Gateway => "GATEWAY",
            DeviceType::Switch => "SWITCH",
            DeviceType::AccessPoint => "ACCESS_POINT",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = Failure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                Failure::new(
                    "deviceType",
                    "INVALID_DEVICE_TYPE",
                    format!("Invalid device type: '{}'", s),
                )
            })
    }
}

/// MAC address in canonical form: upper-case hex octets joined by `:`.
///
/// Addresses written with `-` separators or lower-case digits are accepted
/// and normalised, so `aa-bb-cc-dd-ee-ff` and `AA:BB:CC:DD:EE:FF` name the
/// same device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Parses `raw`, reporting failures against `field`.
    pub fn parse_field(field: &str, raw: &str) -> RuleResult<Self> {
        ValidationRule::<str>::validate(&MacAddressFormat, raw, field)?;
        Ok(MacAddress(raw.replace('-', ":").to_ascii_uppercase()))
    }

    pub fn parse(raw: &str) -> RuleResult<Self> {
        Self::parse_field("macAddress", raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = Failure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MacAddress::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = Failure;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MacAddress::parse(&value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub mac_address: MacAddress,
    pub device_type: DeviceType,
}

impl DeviceDescriptor {
    pub fn new(device_type: DeviceType, mac_address: MacAddress) -> Self {
        Self {
            mac_address,
            device_type,
        }
    }

    /// Listing order: device type precedence, then MAC address.
    pub fn sort_key(&self) -> (DeviceType, &MacAddress) {
        (self.device_type, &self.mac_address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceNode {
    pub mac_address: MacAddress,
    pub device_type: DeviceType,
    pub downlink_devices: Vec<DeviceNode>,
}

impl DeviceNode {
    pub fn leaf(descriptor: DeviceDescriptor) -> Self {
        Self {
            mac_address: descriptor.mac_address,
            device_type: descriptor.device_type,
            downlink_devices: Vec::new(),
        }
    }

    /// Number of devices in this subtree, including the root.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(&node.downlink_devices);
        }
        count
    }
}

/// A validated registration command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDevice {
    pub device_type: DeviceType,
    pub mac_address: MacAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uplink_mac_address: Option<MacAddress>,
}

impl RegisterDevice {
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(self.device_type, self.mac_address.clone())
    }

    /// Canonical request form, with normalised MAC addresses.
    pub fn to_request(&self) -> Request {
        let request = Request::new()
            .with_field("deviceType", self.device_type.as_str())
            .with_field("macAddress", self.mac_address.as_str());

        match &self.uplink_mac_address {
            Some(uplink) => request.with_field("uplinkMacAddress", uplink.as_str()),
            None => request.with_field("uplinkMacAddress", Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mac_address_is_canonicalised() {
        let mac = MacAddress::parse("aa-bb-cc-dd-ee-0f").unwrap();
        assert_eq!(mac.as_str(), "AA:BB:CC:DD:EE:0F");
        assert_eq!(mac, "AA:BB:CC:DD:EE:0F".parse().unwrap());
    }

    #[test]
    fn invalid_mac_address_reports_field() {
        let failure = MacAddress::parse_field("uplinkMacAddress", "AA:BB").unwrap_err();
        assert_eq!(failure.field, "uplinkMacAddress");
        assert_eq!(failure.message, "Invalid MAC address: 'AA:BB'");
    }

    #[test]
    fn device_type_order_is_gateway_switch_access_point() {
        let mut kinds = vec![DeviceType::AccessPoint, DeviceType::Gateway, DeviceType::Switch];
        kinds.sort();
        assert_eq!(kinds, DeviceType::ALL.to_vec());
        assert_eq!("ACCESS_POINT".parse::<DeviceType>(), Ok(DeviceType::AccessPoint));
        assert!("ROUTER".parse::<DeviceType>().is_err());
    }

    #[test]
    fn descriptor_serializes_in_camel_case() {
        let descriptor = DeviceDescriptor::new(
            DeviceType::AccessPoint,
            MacAddress::parse("00:11:22:33:44:55").unwrap(),
        );
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({ "macAddress": "00:11:22:33:44:55", "deviceType": "ACCESS_POINT" })
        );
    }

    #[test]
    fn register_command_deserializes_and_normalises() {
        let command: RegisterDevice = serde_json::from_value(json!({
            "deviceType": "SWITCH",
            "macAddress": "0a-0b-0c-0d-0e-0f",
            "uplinkMacAddress": null
        }))
        .unwrap();

        assert_eq!(command.mac_address.as_str(), "0A:0B:0C:0D:0E:0F");
        assert_eq!(command.uplink_mac_address, None);
        assert_eq!(
            command.to_request().get("macAddress"),
            Some(&json!("0A:0B:0C:0D:0E:0F"))
        );
    }

    #[test]
    fn node_size_counts_whole_subtree() {
        let leaf = |mac: &str| {
            DeviceNode::leaf(DeviceDescriptor::new(
                DeviceType::AccessPoint,
                MacAddress::parse(mac).unwrap(),
            ))
        };
        let mut root = leaf("00:00:00:00:00:01");
        root.downlink_devices = vec![leaf("00:00:00:00:00:02"), leaf("00:00:00:00:00:03")];
        assert_eq!(root.size(), 3);
    }
}
