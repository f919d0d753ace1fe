//! CORS policy built from the configured origin allowlist.
//!
//! An empty allowlist means local development and yields a permissive
//! policy. Otherwise only the listed origins are accepted, compared
//! exactly (scheme, host and port).

use actix_cors::Cors;
use actix_web::http::header::{self, HeaderValue};

/// Whether `origin` appears verbatim in `allowed_origins`.
pub fn is_origin_allowed(origin: &str, allowed_origins: &[String]) -> bool {
    allowed_origins.iter().any(|allowed| allowed == origin)
}

pub fn cors_policy(allowed_origins: &[String]) -> Cors {
    if allowed_origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS is empty, using permissive CORS");
        return Cors::permissive();
    }

    let allowed = allowed_origins.to_vec();
    Cors::default()
        .allowed_origin_fn(move |origin: &HeaderValue, _req| {
            origin
                .to_str()
                .map(|origin| is_origin_allowed(origin, &allowed))
                .unwrap_or(false)
        })
        .allowed_methods(vec!["GET", "POST", "DELETE"])
        .allowed_header(header::CONTENT_TYPE)
        .allowed_header(header::ACCEPT)
        .max_age(3600)
}
