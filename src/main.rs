use std::io;

use actix_web::{web, App, HttpServer};
use tracing_actix_web::TracingLogger;

use netdeploy::config::app::{config_services, AppConfig};
use netdeploy::functional::rule_engine::RuleEngine;
use netdeploy::middleware::cors::cors_policy;
use netdeploy::services::deployment_service::NetworkDeploymentManager;
use netdeploy::utils::logging::init_logging;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    init_logging(config.log_format).map_err(|e| io::Error::other(e.to_string()))?;

    let engine = RuleEngine::with_config(config.engine_config());
    let manager = web::Data::new(NetworkDeploymentManager::new(engine.clone()));
    let engine = web::Data::new(engine);

    tracing::info!(
        host = %config.host,
        port = config.port,
        workers = config.workers,
        policy = %config.evaluation_policy,
        "starting server"
    );

    let origins = config.cors_allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors_policy(&origins))
            .wrap(TracingLogger::default())
            .app_data(manager.clone())
            .app_data(engine.clone())
            .configure(config_services)
    })
    .workers(config.workers)
    .bind(config.bind_address())?
    .run()
    .await
}
