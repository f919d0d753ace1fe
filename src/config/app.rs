use actix_web::web;
use thiserror::Error;

use crate::api::{device_controller, evaluation_controller, health_controller};
use crate::constants;
use crate::error::ServiceError;
use crate::functional::rule_engine::{EngineConfig, EvaluationPolicy};
use crate::utils::logging::LogFormat;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// | Env Var                | Default            |
/// |------------------------|--------------------|
/// | `APP_HOST`             | `127.0.0.1`        |
/// | `APP_PORT`             | `8000`             |
/// | `APP_WORKERS`          | number of CPUs     |
/// | `LOG_FORMAT`           | `text`             |
/// | `EVALUATION_POLICY`    | `short_circuit`    |
/// | `CORS_ALLOWED_ORIGINS` | empty (permissive) |
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub log_format: LogFormat,
    pub evaluation_policy: EvaluationPolicy,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = get("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", get("APP_PORT"), 8000u16)?;

        let workers = parse_or("APP_WORKERS", get("APP_WORKERS"), num_cpus::get())?;
        if workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "APP_WORKERS",
                value: "0".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }

        let log_format = parse_or("LOG_FORMAT", get("LOG_FORMAT"), LogFormat::Text)?;
        let evaluation_policy = parse_or(
            "EVALUATION_POLICY",
            get("EVALUATION_POLICY"),
            EvaluationPolicy::ShortCircuit,
        )?;

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            workers,
            log_format,
            evaluation_policy,
            cors_allowed_origins,
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            policy: self.evaluation_policy,
            ..EngineConfig::default()
        }
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Registers every route under `/api/v1`.
pub fn config_services(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ServiceError::bad_request(err.to_string())
            .with_tag("json")
            .into()
    }))
    .service(
        web::scope(constants::API_PREFIX)
            .service(web::resource("/health").route(web::get().to(health_controller::health)))
            .service(
                web::scope(constants::DEVICES_SCOPE)
                    .service(
                        web::resource("")
                            .route(web::post().to(device_controller::register))
                            .route(web::get().to(device_controller::find_all))
                            .route(web::delete().to(device_controller::reset)),
                    )
                    .service(
                        web::resource("/tree").route(web::get().to(device_controller::device_tree)),
                    )
                    .service(
                        web::resource("/tree/{mac}")
                            .route(web::get().to(device_controller::device_subtree)),
                    )
                    .service(web::resource("/{mac}").route(web::get().to(device_controller::get))),
            )
            .service(
                web::resource("/rules/evaluate")
                    .route(web::post().to(evaluation_controller::evaluate)),
            ),
    );
}
