//! Composable Response Transformers
//!
//! [`ResponseTransformer`] is a fluent builder for the standard
//! `{ message, data, metadata? }` envelope. It implements Actix Web's
//! [`Responder`], negotiating JSON, pretty JSON or plain text from the
//! caller's `Accept` header and the `?pretty=` query parameter.
//!
//! ```no_run
//! use actix_web::http::StatusCode;
//! use actix_web::test::TestRequest;
//! use actix_web::Responder;
//! use netdeploy::functional::response_transformers::ResponseTransformer;
//!
//! let response = ResponseTransformer::new(vec![1, 2, 3])
//!     .with_message("numbers")
//!     .with_status(StatusCode::CREATED)
//!     .respond_to(&TestRequest::default().to_http_request());
//! assert_eq!(response.status(), StatusCode::CREATED);
//! ```

use std::borrow::Cow;

use actix_web::body::BoxBody;
use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder, Responder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use crate::constants;
use crate::models::response::ResponseBody;

/// Supported output formats handled by the response transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseFormat {
    /// Compact JSON (`application/json`).
    Json,
    /// Pretty-printed JSON (`application/json`).
    JsonPretty,
    /// Pretty-printed JSON served as `text/plain`.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatStrategy {
    Auto,
    Forced(ResponseFormat),
}

/// Errors that can occur while composing responses.
#[derive(Debug, Error)]
pub enum ResponseTransformError {
    #[error("metadata serialization failed: {0}")]
    MetadataSerialization(#[from] serde_json::Error),
}

/// Serializable response envelope used for standardized payloads.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope<T>
where
    T: Serialize,
{
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

/// Functional response transformer with fluent, immutable composition.
#[derive(Debug)]
pub struct ResponseTransformer<T> {
    message: Cow<'static, str>,
    data: T,
    status: StatusCode,
    metadata: Option<JsonValue>,
    strategy: FormatStrategy,
}

impl<T> ResponseTransformer<T> {
    /// Creates a transformer answering `200 OK` with message `"ok"`, no
    /// metadata and automatic format negotiation.
    pub fn new(data: T) -> Self {
        Self {
            message: Cow::Borrowed(constants::MESSAGE_OK),
            data,
            status: StatusCode::OK,
            metadata: None,
            strategy: FormatStrategy::Auto,
        }
    }

    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata_value(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Serializes `metadata` and attaches it to the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseTransformError::MetadataSerialization`] when
    /// `metadata` cannot be represented as JSON.
    pub fn try_with_metadata<M>(mut self, metadata: M) -> Result<Self, ResponseTransformError>
    where
        M: Serialize,
    {
        self.metadata = Some(serde_json::to_value(metadata)?);
        Ok(self)
    }

    /// Skip negotiation and always answer in `format`.
    pub fn force_format(mut self, format: ResponseFormat) -> Self {
        self.strategy = FormatStrategy::Forced(format);
        self
    }

    pub fn map_data<U, F>(self, transform: F) -> ResponseTransformer<U>
    where
        F: FnOnce(T) -> U,
    {
        ResponseTransformer {
            message: self.message,
            data: transform(self.data),
            status: self.status,
            metadata: self.metadata,
            strategy: self.strategy,
        }
    }

    fn resolve_format(&self, req: &HttpRequest) -> ResponseFormat {
        match self.strategy {
            FormatStrategy::Forced(format) => format,
            FormatStrategy::Auto => negotiated_format(req).unwrap_or_else(|| {
                if prefers_pretty_json(req) {
                    ResponseFormat::JsonPretty
                } else {
                    ResponseFormat::Json
                }
            }),
        }
    }
}

impl<T> Responder for ResponseTransformer<T>
where
    T: Serialize,
{
    type Body = BoxBody;

    fn respond_to(self, req: &HttpRequest) -> HttpResponse<Self::Body> {
        let format = self.resolve_format(req);
        let builder = HttpResponse::build(self.status);

        let envelope = ResponseEnvelope {
            message: self.message.into_owned(),
            data: self.data,
            metadata: self.metadata,
        };

        match render_response(builder, &envelope, format) {
            Ok(response) => response,
            Err(err) => serialization_error(err),
        }
    }
}

fn render_response<T>(
    mut builder: HttpResponseBuilder,
    envelope: &ResponseEnvelope<T>,
    format: ResponseFormat,
) -> Result<HttpResponse, serde_json::Error>
where
    T: Serialize,
{
    match format {
        ResponseFormat::Json => {
            let payload = serde_json::to_vec(envelope)?;
            builder.insert_header(header::ContentType::json());
            Ok(builder.body(payload))
        }
        ResponseFormat::JsonPretty => {
            let payload = serde_json::to_string_pretty(envelope)?;
            builder.insert_header(header::ContentType::json());
            Ok(builder.body(payload))
        }
        ResponseFormat::Text => {
            let payload = serde_json::to_string_pretty(envelope)?;
            builder.insert_header(header::ContentType::plaintext());
            Ok(builder.body(payload))
        }
    }
}

fn serialization_error(err: serde_json::Error) -> HttpResponse {
    tracing::error!(error = %err, "response serialization failed");
    let body = ResponseBody::new(
        constants::MESSAGE_INTERNAL_SERVER_ERROR,
        json!({ "code": "INTERNAL" }),
    );
    HttpResponse::InternalServerError().json(body)
}

/// Highest-quality entry of the `Accept` header that maps onto a format.
fn negotiated_format(req: &HttpRequest) -> Option<ResponseFormat> {
    req.headers()
        .get_all(header::ACCEPT)
        .filter_map(|value| value.to_str().ok())
        .flat_map(|line| line.split(','))
        .filter_map(|token| parse_accept_entry(token.trim()))
        .filter(|(_, quality)| *quality > 0.0)
        .fold(None, |best: Option<(ResponseFormat, f32)>, candidate| match best {
            Some((_, best_quality)) if best_quality >= candidate.1 => best,
            _ => Some(candidate),
        })
        .map(|(format, _)| format)
}

fn parse_accept_entry(token: &str) -> Option<(ResponseFormat, f32)> {
    let mut parts = token.split(';');
    let media_type = parts.next()?.trim().to_ascii_lowercase();

    let quality = parts
        .find_map(|param| param.trim().strip_prefix("q="))
        .and_then(|q| q.parse::<f32>().ok())
        .unwrap_or(1.0)
        .clamp(0.0, 1.0);

    parse_media_type(&media_type).map(|format| (format, quality))
}

fn parse_media_type(media_type: &str) -> Option<ResponseFormat> {
    match media_type {
        "application/json" | "application/*" => Some(ResponseFormat::Json),
        "application/json+pretty" => Some(ResponseFormat::JsonPretty),
        "text/plain" | "text/*" => Some(ResponseFormat::Text),
        _ if media_type.ends_with("+json") => Some(ResponseFormat::Json),
        _ => None,
    }
}

/// `pretty=1`, `pretty=true` or `format=pretty` in the query string
/// (case-insensitive).
fn prefers_pretty_json(req: &HttpRequest) -> bool {
    #[derive(Deserialize)]
    struct PrettyQuery {
        #[serde(default)]
        pretty: Option<String>,
        #[serde(default)]
        format: Option<String>,
    }

    let Ok(query) = web::Query::<PrettyQuery>::from_query(req.query_string()) else {
        return false;
    };

    let pretty = query.pretty.as_deref().map(str::trim).is_some_and(|value| {
        value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("pretty")
    });

    pretty
        || query
            .format
            .as_deref()
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("pretty"))
}
