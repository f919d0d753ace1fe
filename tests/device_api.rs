use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use netdeploy::config::app::config_services;
use netdeploy::constants::MAX_TREE_LEVELS;
use netdeploy::functional::rule_engine::RuleEngine;
use netdeploy::services::deployment_service::NetworkDeploymentManager;

const DEVICES: &str = "/api/v1/network-deployment/devices";

const GATEWAY: &str = "00:00:00:00:00:01";
const SWITCH: &str = "00:00:00:00:00:02";
const ACCESS_POINT: &str = "00:00:00:00:00:03";

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(NetworkDeploymentManager::new(RuleEngine::new())))
                .app_data(web::Data::new(RuleEngine::new()))
                .configure(config_services),
        )
        .await
    };
}

/// Calls the service and returns the status with the decoded JSON body.
macro_rules! send {
    ($app:expr, $req:expr $(,)?) => {{
        let response = test::call_service(&$app, $req.to_request()).await;
        let status = response.status();
        let body = test::read_body(response).await;
        let json: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }};
}

macro_rules! populate {
    ($app:expr) => {
        for body in [
            json!({ "deviceType": "GATEWAY", "macAddress": GATEWAY }),
            json!({ "deviceType": "ACCESS_POINT", "macAddress": ACCESS_POINT, "uplinkMacAddress": GATEWAY }),
            json!({ "deviceType": "SWITCH", "macAddress": SWITCH, "uplinkMacAddress": GATEWAY }),
        ] {
            let (status, _) = send!($app, register(body));
            assert_eq!(status, StatusCode::CREATED);
        }
    };
}

fn register(body: Value) -> test::TestRequest {
    test::TestRequest::post().uri(DEVICES).set_json(body)
}

#[actix_web::test]
async fn register_returns_created_descriptor() {
    let app = app!();
    let (status, body) = send!(
        app,
        register(json!({ "deviceType": "GATEWAY", "macAddress": "aa-bb-cc-dd-ee-ff" })),
    );

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body["data"],
        json!({ "macAddress": "AA:BB:CC:DD:EE:FF", "deviceType": "GATEWAY" })
    );
}

#[actix_web::test]
async fn register_reports_every_payload_problem() {
    let app = app!();
    let (status, body) = send!(
        app,
        register(json!({ "deviceType": "ROUTER", "macAddress": "nope" })),
    );

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["code"], "BAD_REQUEST");
    let failures = body["data"]["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0]["field"], "deviceType");
    assert_eq!(failures[1]["message"], "Invalid MAC address: 'nope'");
}

#[actix_web::test]
async fn register_rejects_non_object_and_malformed_bodies() {
    let app = app!();
    let (status, body) = send!(app, register(json!([1, 2, 3])));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "request body must be a JSON object");

    let malformed = test::TestRequest::post()
        .uri(DEVICES)
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json");
    let (status, body) = send!(app, malformed);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["code"], "BAD_REQUEST");
}

#[actix_web::test]
async fn register_enforces_business_rules_in_order() {
    let app = app!();
    populate!(app);

    let (status, body) = send!(
        app,
        register(json!({ "deviceType": "SWITCH", "macAddress": SWITCH })),
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Device with '00:00:00:00:00:02' MAC address already exists"
    );

    let (_, body) = send!(
        app,
        register(json!({ "deviceType": "SWITCH", "macAddress": "00:00:00:00:00:09" })),
    );
    assert_eq!(
        body["message"],
        "Root device already exists, uplink MAC address is required"
    );

    let (_, body) = send!(
        app,
        register(json!({
            "deviceType": "SWITCH",
            "macAddress": "00:00:00:00:00:09",
            "uplinkMacAddress": "00:00:00:00:00:0A"
        })),
    );
    assert_eq!(
        body["message"],
        "Uplink device with '00:00:00:00:00:0A' MAC address does not exist"
    );
}

#[actix_web::test]
async fn list_is_sorted_by_type_then_mac() {
    let app = app!();
    populate!(app);

    let (status, body) = send!(app, test::TestRequest::get().uri(DEVICES));
    assert_eq!(status, StatusCode::OK);
    let macs: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|device| device["macAddress"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(macs, vec![GATEWAY, SWITCH, ACCESS_POINT]);
    assert_eq!(body["metadata"]["count"], 3);
}

#[actix_web::test]
async fn get_device_by_mac() {
    let app = app!();
    populate!(app);

    let uri = format!("{}/{}", DEVICES, "00-00-00-00-00-02");
    let (status, body) = send!(app, test::TestRequest::get().uri(&uri));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deviceType"], "SWITCH");

    let uri = format!("{}/{}", DEVICES, "0A:0A:0A:0A:0A:0A");
    let (status, body) = send!(app, test::TestRequest::get().uri(&uri));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["message"],
        "Device with '0A:0A:0A:0A:0A:0A' MAC address cannot be found"
    );

    let uri = format!("{}/{}", DEVICES, "not-a-mac");
    let (status, _) = send!(app, test::TestRequest::get().uri(&uri));
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn tree_and_subtree() {
    let app = app!();

    let tree_uri = format!("{}/tree", DEVICES);
    let (status, body) = send!(app, test::TestRequest::get().uri(&tree_uri));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["message"],
        "Network deployment does not contain any devices"
    );

    populate!(app);
    let (status, body) = send!(app, test::TestRequest::get().uri(&tree_uri));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["macAddress"], GATEWAY);
    let children: Vec<_> = body["data"]["downlinkDevices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["macAddress"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(children, vec![SWITCH, ACCESS_POINT]);
    assert_eq!(body["metadata"]["devices"], 3);

    let uri = format!("{}/tree/{}", DEVICES, SWITCH);
    let (status, body) = send!(app, test::TestRequest::get().uri(&uri));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({ "macAddress": SWITCH, "deviceType": "SWITCH", "downlinkDevices": [] })
    );

    let uri = format!("{}/tree/{}", DEVICES, "0A:0A:0A:0A:0A:0A");
    let (status, body) = send!(app, test::TestRequest::get().uri(&uri));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["message"],
        "Device with '0A:0A:0A:0A:0A:0A' MAC address does not exist"
    );
}

#[actix_web::test]
async fn reset_empties_the_deployment() {
    let app = app!();
    populate!(app);

    let (status, _) = send!(app, test::TestRequest::delete().uri(DEVICES));
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send!(app, test::TestRequest::get().uri(DEVICES));
    assert_eq!(body["data"], json!([]));
}

#[actix_web::test]
async fn health_reports_device_count() {
    let app = app!();
    populate!(app);

    let (status, body) = send!(app, test::TestRequest::get().uri("/api/v1/health"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["deviceCount"], 3);
    assert!(body["data"]["timestamp"].is_string());
}

#[actix_web::test]
async fn register_rejects_trees_deeper_than_the_limit() {
    let app = app!();
    let chain_mac = |i: usize| format!("00:00:00:00:{:02X}:{:02X}", i / 256, i % 256);

    let (status, _) = send!(
        app,
        register(json!({ "deviceType": "GATEWAY", "macAddress": chain_mac(1) })),
    );
    assert_eq!(status, StatusCode::CREATED);
    for i in 2..=MAX_TREE_LEVELS {
        let (status, _) = send!(
            app,
            register(json!({
                "deviceType": "SWITCH",
                "macAddress": chain_mac(i),
                "uplinkMacAddress": chain_mac(i - 1)
            })),
        );
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send!(
        app,
        register(json!({
            "deviceType": "ACCESS_POINT",
            "macAddress": "0A:0A:0A:0A:0A:0A",
            "uplinkMacAddress": chain_mac(MAX_TREE_LEVELS)
        })),
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["failures"][0]["code"], "TREE_TOO_DEEP");

    let tree_uri = format!("{}/tree", DEVICES);
    let (status, body) = send!(app, test::TestRequest::get().uri(&tree_uri));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["devices"], MAX_TREE_LEVELS);
}
