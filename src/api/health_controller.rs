use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;

use crate::constants;
use crate::models::response::ResponseBody;
use crate::services::deployment_service::NetworkDeploymentManager;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Status {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: Status,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_count: Option<usize>,
}

/// Service status with the number of registered devices.
///
/// Answers 503 when the deployment state cannot be read.
pub async fn health(manager: web::Data<NetworkDeploymentManager>) -> HttpResponse {
    let device_count = match manager.device_count() {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::error!(error = %e, "deployment state unavailable during health check");
            None
        }
    };

    let status = if device_count.is_some() {
        Status::Healthy
    } else {
        Status::Unhealthy
    };

    let body = ResponseBody::new(
        constants::MESSAGE_OK,
        HealthResponse {
            status,
            timestamp: Utc::now().to_rfc3339(),
            device_count,
        },
    );

    match status {
        Status::Healthy => HttpResponse::Ok().json(body),
        Status::Unhealthy => HttpResponse::ServiceUnavailable().json(body),
    }
}
