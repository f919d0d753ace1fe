//! Network deployment registry
//!
//! Keeps the single device tree of a network deployment in memory. The state
//! is an immutable [`Deployment`] snapshot built from persistent maps behind
//! an `RwLock`; readers clone the snapshot (O(1)) and work without holding
//! the lock, writers replace it.
//!
//! Registration runs two rule passes through the [`RuleEngine`]:
//!
//! 1. payload shape, accumulated so every problem is reported at once;
//! 2. business rules against the current snapshot, short-circuited in order:
//!    the device is new, an uplink is given once a root exists, the uplink is
//!    a known device, and the tree stays within
//!    [`MAX_TREE_LEVELS`](constants::MAX_TREE_LEVELS).

use std::sync::RwLock;

use im::{OrdMap, OrdSet};
use itertools::Itertools;

use crate::{
    constants,
    error::{ServiceError, ServiceResult},
    functional::{
        request::Request,
        rule::{field_string, Rule},
        rule_engine::{EvaluationPolicy, RuleEngine, RuleSet},
        validation_rules::Failure,
    },
    models::device::{
        validators::{self, MAC_ADDRESS, UPLINK_MAC_ADDRESS},
        DeviceDescriptor, DeviceNode, DeviceType, MacAddress, RegisterDevice,
    },
};

/// Immutable view of the deployment at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Deployment {
    devices: OrdMap<MacAddress, DeviceType>,
    downlinks: OrdMap<MacAddress, OrdSet<MacAddress>>,
    levels: OrdMap<MacAddress, usize>,
    root: Option<MacAddress>,
}

impl Deployment {
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.devices.contains_key(mac)
    }

    pub fn root(&self) -> Option<&MacAddress> {
        self.root.as_ref()
    }

    pub fn descriptor(&self, mac: &MacAddress) -> Option<DeviceDescriptor> {
        self.devices
            .get(mac)
            .map(|device_type| DeviceDescriptor::new(*device_type, mac.clone()))
    }

    /// Every device, ordered by device type precedence then MAC address.
    pub fn descriptors(&self) -> Vec<DeviceDescriptor> {
        self.devices
            .iter()
            .map(|(mac, device_type)| DeviceDescriptor::new(*device_type, mac.clone()))
            .sorted_by(|a, b| a.sort_key().cmp(&b.sort_key()))
            .collect()
    }

    /// Tree level of `mac`; the root sits on level 1.
    pub fn level(&self, mac: &MacAddress) -> Option<usize> {
        self.levels.get(mac).copied()
    }

    fn sorted_downlinks(&self, mac: &MacAddress) -> Vec<DeviceDescriptor> {
        self.downlinks
            .get(mac)
            .into_iter()
            .flatten()
            .filter_map(|child| self.descriptor(child))
            .sorted_by(|a, b| a.sort_key().cmp(&b.sort_key()))
            .collect()
    }

    /// Tree rooted at `mac`, downlinks ordered like [`Deployment::descriptors`].
    pub fn subtree(&self, mac: &MacAddress) -> Option<DeviceNode> {
        let root = self.descriptor(mac)?;

        // Pre-order walk with an explicit stack: every device lands after
        // its uplink, remembering the uplink's slot.
        let mut parents: Vec<Option<usize>> = Vec::new();
        let mut nodes: Vec<Option<DeviceNode>> = Vec::new();
        let mut pending = vec![(None, root)];
        while let Some((parent, descriptor)) = pending.pop() {
            let slot = nodes.len();
            pending.extend(
                self.sorted_downlinks(&descriptor.mac_address)
                    .into_iter()
                    .rev()
                    .map(|child| (Some(slot), child)),
            );
            parents.push(parent);
            nodes.push(Some(DeviceNode::leaf(descriptor)));
        }

        // Walking back, a node's downlinks are complete (in reverse) by the
        // time it is attached to its uplink.
        for slot in (1..nodes.len()).rev() {
            let Some(mut node) = nodes[slot].take() else {
                continue;
            };
            node.downlink_devices.reverse();
            if let Some(uplink) = parents[slot].and_then(|parent| nodes[parent].as_mut()) {
                uplink.downlink_devices.push(node);
            }
        }

        let mut root = nodes.into_iter().next().flatten()?;
        root.downlink_devices.reverse();
        Some(root)
    }

    /// New snapshot with the device added and linked under its uplink.
    fn with_device(&self, command: &RegisterDevice) -> Self {
        let mac = command.mac_address.clone();

        let downlinks = match &command.uplink_mac_address {
            Some(uplink) => self.downlinks.alter(
                |children| Some(children.unwrap_or_default().update(mac.clone())),
                uplink.clone(),
            ),
            None => self.downlinks.clone(),
        };

        let level = command
            .uplink_mac_address
            .as_ref()
            .and_then(|uplink| self.level(uplink))
            .map_or(1, |uplink_level| uplink_level + 1);

        Self {
            devices: self.devices.update(mac.clone(), command.device_type),
            downlinks,
            levels: self.levels.update(mac.clone(), level),
            root: self.root.clone().or(Some(mac)),
        }
    }
}

fn mac_field(field: &'static str) -> Rule<MacAddress> {
    field_string(field).and_then(move |raw| MacAddress::parse_field(field, &raw))
}

fn optional_mac_field(field: &'static str) -> Rule<Option<MacAddress>> {
    Rule::new(format!("{} optional", field), move |request: &Request| {
        request
            .value(field)
            .and_then(|value| value.as_str())
            .map(|raw| MacAddress::parse_field(field, raw))
            .transpose()
    })
}

/// Business rules for registering into `deployment`, in evaluation order.
pub fn registration_rules(deployment: &Deployment) -> RuleSet<()> {
    let existing = deployment.clone();
    let device_is_new = mac_field(MAC_ADDRESS)
        .and_then(move |mac| {
            if existing.contains(&mac) {
                Err(Failure::new(
                    MAC_ADDRESS,
                    "DEVICE_EXISTS",
                    format!("Device with '{}' MAC address already exists", mac),
                ))
            } else {
                Ok(())
            }
        })
        .named("device is new");

    let has_root = !deployment.is_empty();
    let uplink_given_once_rooted = optional_mac_field(UPLINK_MAC_ADDRESS)
        .and_then(move |uplink| {
            if has_root && uplink.is_none() {
                Err(Failure::new(
                    UPLINK_MAC_ADDRESS,
                    "UPLINK_REQUIRED",
                    "Root device already exists, uplink MAC address is required",
                ))
            } else {
                Ok(())
            }
        })
        .named("uplink required once rooted");

    let existing = deployment.clone();
    let uplink_exists = optional_mac_field(UPLINK_MAC_ADDRESS)
        .and_then(move |uplink| match uplink {
            Some(uplink) if !existing.contains(&uplink) => Err(Failure::new(
                UPLINK_MAC_ADDRESS,
                "UPLINK_NOT_FOUND",
                format!("Uplink device with '{}' MAC address does not exist", uplink),
            )),
            _ => Ok(()),
        })
        .named("uplink exists");

    let existing = deployment.clone();
    let tree_has_room = optional_mac_field(UPLINK_MAC_ADDRESS)
        .and_then(move |uplink| {
            let uplink_level = uplink.as_ref().and_then(|uplink| existing.level(uplink));
            match (uplink, uplink_level) {
                (Some(uplink), Some(level)) if level >= constants::MAX_TREE_LEVELS => {
                    Err(Failure::new(
                        UPLINK_MAC_ADDRESS,
                        "TREE_TOO_DEEP",
                        format!(
                            "Uplink device with '{}' MAC address is already at the maximum tree depth of {}",
                            uplink,
                            constants::MAX_TREE_LEVELS
                        ),
                    ))
                }
                _ => Ok(()),
            }
        })
        .named("tree depth within limit");

    RuleSet::new()
        .rule(device_is_new)
        .rule(uplink_given_once_rooted)
        .rule(uplink_exists)
        .rule(tree_has_room)
}

fn poisoned<E: std::fmt::Display>(err: E) -> ServiceError {
    ServiceError::internal_server_error(format!("Deployment state lock poisoned: {}", err))
        .with_tag("deployment")
}

/// Thread-safe registry of the devices of one network deployment.
#[derive(Debug, Default)]
pub struct NetworkDeploymentManager {
    state: RwLock<Deployment>,
    engine: RuleEngine,
}

impl NetworkDeploymentManager {
    pub fn new(engine: RuleEngine) -> Self {
        Self {
            state: RwLock::new(Deployment::default()),
            engine,
        }
    }

    /// Current snapshot of the deployment.
    pub fn snapshot(&self) -> ServiceResult<Deployment> {
        self.state
            .read()
            .map(|deployment| deployment.clone())
            .map_err(poisoned)
    }

    /// Registers a device described by a raw JSON payload.
    ///
    /// # Errors
    ///
    /// `BadRequest` listing every malformed field, or the first broken
    /// business rule; `InternalServerError` if the state lock is poisoned.
    pub fn register_device(&self, payload: &Request) -> ServiceResult<DeviceDescriptor> {
        let command = validators::validate_register(&self.engine, payload)?;
        let request = command.to_request();

        // Check and insert under one write lock so concurrent registrations
        // cannot both pass the uniqueness and root rules.
        let mut state = self.state.write().map_err(poisoned)?;
        let rules = registration_rules(&state);

        self.engine
            .evaluate_with(&request, &rules, EvaluationPolicy::ShortCircuit)
            .into_result()
            .map_err(|failures| ServiceError::validation(failures).with_tag("deployment"))?;

        *state = state.with_device(&command);
        tracing::info!(
            mac = %command.mac_address,
            device_type = %command.device_type,
            uplink = ?command.uplink_mac_address.as_ref().map(MacAddress::as_str),
            "device registered"
        );
        Ok(command.descriptor())
    }

    /// Every device, ordered by device type then MAC address.
    pub fn find_all(&self) -> ServiceResult<Vec<DeviceDescriptor>> {
        self.snapshot().map(|deployment| deployment.descriptors())
    }

    pub fn get(&self, mac: &MacAddress) -> ServiceResult<DeviceDescriptor> {
        self.snapshot()?.descriptor(mac).ok_or_else(|| {
            ServiceError::not_found(format!(
                "Device with '{}' MAC address cannot be found",
                mac
            ))
            .with_tag("deployment")
        })
    }

    /// Whole tree, rooted at the first registered device.
    pub fn device_tree(&self) -> ServiceResult<DeviceNode> {
        let deployment = self.snapshot()?;
        deployment
            .root()
            .and_then(|root| deployment.subtree(root))
            .ok_or_else(|| {
                ServiceError::not_found(constants::MESSAGE_EMPTY_DEPLOYMENT).with_tag("deployment")
            })
    }

    pub fn device_subtree(&self, mac: &MacAddress) -> ServiceResult<DeviceNode> {
        self.snapshot()?.subtree(mac).ok_or_else(|| {
            ServiceError::not_found(format!(
                "Device with '{}' MAC address does not exist",
                mac
            ))
            .with_tag("deployment")
        })
    }

    /// Removes every device.
    pub fn reset(&self) -> ServiceResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let removed = state.len();
        *state = Deployment::default();
        tracing::info!(removed, "network deployment reset");
        Ok(())
    }

    pub fn device_count(&self) -> ServiceResult<usize> {
        self.snapshot().map(|deployment| deployment.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::functional_service_base::FunctionalErrorHandling;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts events at `INFO` or more severe.
    struct CountEvents(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for CountEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() <= tracing::Level::INFO {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn payload(device_type: &str, mac: &str, uplink: Option<&str>) -> Request {
        let body = match uplink {
            Some(uplink) => json!({
                "deviceType": device_type,
                "macAddress": mac,
                "uplinkMacAddress": uplink
            }),
            None => json!({ "deviceType": device_type, "macAddress": mac }),
        };
        Request::from_json(body).unwrap()
    }

    fn mac(raw: &str) -> MacAddress {
        MacAddress::parse(raw).unwrap()
    }

    const GW: &str = "00:00:00:00:00:01";
    const SW: &str = "00:00:00:00:00:02";
    const AP1: &str = "00:00:00:00:00:03";
    const AP2: &str = "00:00:00:00:00:04";

    fn populated() -> NetworkDeploymentManager {
        let manager = NetworkDeploymentManager::default();
        manager.register_device(&payload("GATEWAY", GW, None)).unwrap();
        manager.register_device(&payload("SWITCH", SW, Some(GW))).unwrap();
        manager.register_device(&payload("ACCESS_POINT", AP2, Some(SW))).unwrap();
        manager.register_device(&payload("ACCESS_POINT", AP1, Some(GW))).unwrap();
        manager
    }

    #[test]
    fn first_device_becomes_root() {
        let manager = NetworkDeploymentManager::default();
        let descriptor = manager
            .register_device(&payload("SWITCH", "aa-bb-cc-dd-ee-ff", None))
            .unwrap();

        assert_eq!(descriptor.mac_address.as_str(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(manager.snapshot().unwrap().root(), Some(&mac("AA:BB:CC:DD:EE:FF")));
    }

    #[test]
    fn duplicate_device_is_rejected_in_any_spelling() {
        let manager = populated();
        let error = manager
            .register_device(&payload("GATEWAY", "00-00-00-00-00-01", Some(SW)))
            .unwrap_err();

        assert_eq!(
            error.message(),
            "Device with '00:00:00:00:00:01' MAC address already exists"
        );
        assert_eq!(error.context().failures().len(), 1);
    }

    #[test]
    fn second_root_is_rejected() {
        let manager = populated();
        let error = manager
            .register_device(&payload("GATEWAY", "00:00:00:00:00:09", None))
            .unwrap_err();
        assert_eq!(
            error.message(),
            "Root device already exists, uplink MAC address is required"
        );
    }

    #[test]
    fn unknown_uplink_is_rejected() {
        let manager = populated();
        let error = manager
            .register_device(&payload("SWITCH", "00:00:00:00:00:09", Some("0A:0A:0A:0A:0A:0A")))
            .unwrap_err();
        assert_eq!(
            error.message(),
            "Uplink device with '0A:0A:0A:0A:0A:0A' MAC address does not exist"
        );
    }

    #[test]
    fn business_rules_stop_at_first_failure() {
        // Duplicate MAC and missing uplink: only the duplicate is reported.
        let manager = populated();
        let error = manager
            .register_device(&payload("SWITCH", SW, None))
            .unwrap_err();
        let codes: Vec<_> = error
            .context()
            .failures()
            .iter()
            .map(|f| f.code.as_str())
            .collect();
        assert_eq!(codes, vec!["DEVICE_EXISTS"]);
    }

    #[test]
    fn find_all_sorts_by_type_then_mac() {
        let listed: Vec<_> = populated()
            .find_all()
            .unwrap()
            .into_iter()
            .map(|d| d.mac_address.to_string())
            .collect();
        assert_eq!(listed, vec![GW, SW, AP1, AP2]);
    }

    #[test]
    fn get_reports_missing_device() {
        let manager = populated();
        assert_eq!(manager.get(&mac(SW)).unwrap().device_type, DeviceType::Switch);

        let error = manager.get(&mac("0A:0A:0A:0A:0A:0A")).unwrap_err();
        assert!(matches!(error, ServiceError::NotFound { .. }));
        assert_eq!(
            error.message(),
            "Device with '0A:0A:0A:0A:0A:0A' MAC address cannot be found"
        );
    }

    #[test]
    fn tree_nests_downlinks_in_listing_order() {
        let tree = populated().device_tree().unwrap();

        assert_eq!(tree.mac_address, mac(GW));
        assert_eq!(tree.size(), 4);
        let children: Vec<_> = tree
            .downlink_devices
            .iter()
            .map(|node| node.mac_address.to_string())
            .collect();
        assert_eq!(children, vec![SW, AP1]);
        assert_eq!(tree.downlink_devices[0].downlink_devices[0].mac_address, mac(AP2));
    }

    #[test]
    fn empty_deployment_has_no_tree() {
        let error = NetworkDeploymentManager::default().device_tree().unwrap_err();
        assert_eq!(error.message(), constants::MESSAGE_EMPTY_DEPLOYMENT);
    }

    #[test]
    fn subtree_of_unknown_device_is_not_found() {
        let manager = populated();
        let subtree = manager.device_subtree(&mac(SW)).unwrap();
        assert_eq!(subtree.size(), 2);

        let error = manager.device_subtree(&mac("0A:0A:0A:0A:0A:0A")).unwrap_err();
        assert_eq!(
            error.message(),
            "Device with '0A:0A:0A:0A:0A:0A' MAC address does not exist"
        );
    }

    #[test]
    fn reset_allows_a_new_root() {
        let manager = populated();
        manager.reset().unwrap();
        assert_eq!(manager.device_count().unwrap(), 0);
        assert!(manager
            .register_device(&payload("ACCESS_POINT", AP1, None))
            .is_ok());
    }

    #[test]
    fn snapshots_are_unaffected_by_later_writes() {
        let manager = populated();
        let before = manager.snapshot().unwrap();
        manager
            .register_device(&payload("ACCESS_POINT", "00:00:00:00:00:05", Some(SW)))
            .unwrap();

        assert_eq!(before.len(), 4);
        assert_eq!(manager.device_count().unwrap(), 5);
    }

    #[test]
    fn concurrent_registrations_keep_one_root() {
        let manager = Arc::new(NetworkDeploymentManager::default());
        let handles: Vec<_> = (1..=8u8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    let mac = format!("00:00:00:00:00:{:02X}", i);
                    manager.register_device(&payload("GATEWAY", &mac, None)).is_ok()
                })
            })
            .collect();

        let registered = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(registered, 1);
        assert_eq!(manager.device_count().unwrap(), 1);
    }

    fn chain_mac(i: usize) -> String {
        format!("00:00:00:00:{:02X}:{:02X}", i / 256, i % 256)
    }

    /// Registers a straight chain of `levels` switches, each under the previous one.
    fn chain(levels: usize) -> NetworkDeploymentManager {
        let manager = NetworkDeploymentManager::default();
        manager
            .register_device(&payload("SWITCH", &chain_mac(1), None))
            .unwrap();
        for i in 2..=levels {
            let uplink = chain_mac(i - 1);
            manager
                .register_device(&payload("SWITCH", &chain_mac(i), Some(&uplink)))
                .unwrap();
        }
        manager
    }

    #[test]
    fn levels_follow_the_uplink_chain() {
        let snapshot = populated().snapshot().unwrap();
        assert_eq!(snapshot.level(&mac(GW)), Some(1));
        assert_eq!(snapshot.level(&mac(SW)), Some(2));
        assert_eq!(snapshot.level(&mac(AP2)), Some(3));
        assert_eq!(snapshot.level(&mac("0A:0A:0A:0A:0A:0A")), None);
    }

    #[test]
    fn registration_past_max_depth_is_rejected() {
        let manager = chain(constants::MAX_TREE_LEVELS);
        let deepest = chain_mac(constants::MAX_TREE_LEVELS);

        let error = manager
            .register_device(&payload("ACCESS_POINT", "0A:0A:0A:0A:0A:0A", Some(&deepest)))
            .unwrap_err();

        assert!(matches!(error, ServiceError::BadRequest { .. }));
        assert_eq!(error.context().failures()[0].code, "TREE_TOO_DEEP");
        assert_eq!(manager.device_count().unwrap(), constants::MAX_TREE_LEVELS);

        // A shallower uplink still has room.
        let root = chain_mac(1);
        assert!(manager
            .register_device(&payload("ACCESS_POINT", "0A:0A:0A:0A:0A:0A", Some(&root)))
            .is_ok());
    }

    #[test]
    fn deepest_allowed_tree_is_built_whole() {
        let tree = chain(constants::MAX_TREE_LEVELS).device_tree().unwrap();
        assert_eq!(tree.size(), constants::MAX_TREE_LEVELS);

        let mut node = &tree;
        let mut depth = 1;
        while let Some(child) = node.downlink_devices.first() {
            assert_eq!(node.downlink_devices.len(), 1);
            node = child;
            depth += 1;
        }
        assert_eq!(depth, constants::MAX_TREE_LEVELS);
        assert_eq!(node.mac_address, mac(&chain_mac(constants::MAX_TREE_LEVELS)));
    }

    #[test]
    fn wide_tree_keeps_sibling_order_at_every_level() {
        let manager = populated();
        manager
            .register_device(&payload("ACCESS_POINT", "00:00:00:00:00:06", Some(SW)))
            .unwrap();
        manager
            .register_device(&payload("GATEWAY", "00:00:00:00:00:07", Some(SW)))
            .unwrap();

        let tree = manager.device_tree().unwrap();
        let switch = &tree.downlink_devices[0];
        let under_switch: Vec<_> = switch
            .downlink_devices
            .iter()
            .map(|node| node.mac_address.to_string())
            .collect();
        assert_eq!(
            under_switch,
            vec!["00:00:00:00:00:07", AP2, "00:00:00:00:00:06"]
        );
        assert_eq!(tree.size(), 6);
    }

    #[test]
    fn rejected_registration_is_logged_once_by_the_caller() {
        let manager = populated();
        let events = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(CountEvents(Arc::clone(&events)));

        tracing::subscriber::with_default(subscriber, || {
            let duplicate = manager.register_device(&payload("SWITCH", SW, Some(GW)));
            assert!(duplicate.is_err());
            assert_eq!(events.load(Ordering::SeqCst), 0);

            let malformed = manager
                .register_device(&payload("ROUTER", "nope", None))
                .log_error("device_controller::register");
            assert!(malformed.is_err());
            assert_eq!(events.load(Ordering::SeqCst), 1);
        });
    }
}
