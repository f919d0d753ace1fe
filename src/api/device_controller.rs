use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde_json::{json, Value};
use std::borrow::Cow;

use crate::{
    constants,
    error::ServiceError,
    functional::{
        request::Request,
        response_transformers::{ResponseTransformError, ResponseTransformer},
    },
    models::device::MacAddress,
    services::{
        deployment_service::NetworkDeploymentManager,
        functional_service_base::FunctionalErrorHandling,
    },
};

fn response_composition_error(err: ResponseTransformError) -> ServiceError {
    ServiceError::internal_server_error(constants::MESSAGE_INTERNAL_SERVER_ERROR)
        .with_tag("response")
        .with_detail(err.to_string())
}

fn path_mac(raw: &str) -> Result<MacAddress, ServiceError> {
    MacAddress::parse(raw).map_err(|failure| ServiceError::from(failure).with_tag("path"))
}

// POST api/v1/network-deployment/devices
pub async fn register(
    payload: web::Json<Value>,
    manager: web::Data<NetworkDeploymentManager>,
    req: HttpRequest,
) -> Result<HttpResponse, ServiceError> {
    let payload = Request::from_json(payload.into_inner())?;
    let descriptor = manager
        .register_device(&payload)
        .log_error("device_controller::register")?;

    Ok(ResponseTransformer::new(descriptor)
        .with_message(Cow::Borrowed(constants::MESSAGE_DEVICE_REGISTERED))
        .with_status(StatusCode::CREATED)
        .respond_to(&req))
}

// GET api/v1/network-deployment/devices
pub async fn find_all(
    manager: web::Data<NetworkDeploymentManager>,
    req: HttpRequest,
) -> Result<HttpResponse, ServiceError> {
    let devices = manager.find_all().log_error("device_controller::find_all")?;
    let count = devices.len();

    ResponseTransformer::new(devices)
        .try_with_metadata(json!({ "count": count }))
        .map(|transformer| transformer.respond_to(&req))
        .map_err(response_composition_error)
}

// GET api/v1/network-deployment/devices/{mac}
pub async fn get(
    mac: web::Path<String>,
    manager: web::Data<NetworkDeploymentManager>,
    req: HttpRequest,
) -> Result<HttpResponse, ServiceError> {
    let mac = path_mac(&mac)?;
    let descriptor = manager.get(&mac).log_error("device_controller::get")?;
    Ok(ResponseTransformer::new(descriptor).respond_to(&req))
}

// GET api/v1/network-deployment/devices/tree
pub async fn device_tree(
    manager: web::Data<NetworkDeploymentManager>,
    req: HttpRequest,
) -> Result<HttpResponse, ServiceError> {
    let tree = manager
        .device_tree()
        .log_error("device_controller::device_tree")?;
    let size = tree.size();

    ResponseTransformer::new(tree)
        .try_with_metadata(json!({ "devices": size }))
        .map(|transformer| transformer.respond_to(&req))
        .map_err(response_composition_error)
}

// GET api/v1/network-deployment/devices/tree/{mac}
pub async fn device_subtree(
    mac: web::Path<String>,
    manager: web::Data<NetworkDeploymentManager>,
    req: HttpRequest,
) -> Result<HttpResponse, ServiceError> {
    let mac = path_mac(&mac)?;
    let subtree = manager
        .device_subtree(&mac)
        .log_error("device_controller::device_subtree")?;
    let size = subtree.size();

    ResponseTransformer::new(subtree)
        .try_with_metadata(json!({ "devices": size }))
        .map(|transformer| transformer.respond_to(&req))
        .map_err(response_composition_error)
}

// DELETE api/v1/network-deployment/devices
pub async fn reset(
    manager: web::Data<NetworkDeploymentManager>,
    req: HttpRequest,
) -> Result<HttpResponse, ServiceError> {
    manager.reset().log_error("device_controller::reset")?;

    Ok(ResponseTransformer::new(constants::EMPTY)
        .with_message(Cow::Borrowed(constants::MESSAGE_DEPLOYMENT_RESET))
        .respond_to(&req))
}
