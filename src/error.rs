use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::constants;
use crate::functional::validation_rules::Failure;
use crate::models::response::ResponseBody;

/// Extra information carried by a [`ServiceError`].
///
/// Tags and details only ever reach the logs. Failures are part of the
/// response body so clients can see every rule that rejected the request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    tags: Vec<String>,
    details: Vec<String>,
    failures: Vec<Failure>,
}

impl ErrorContext {
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    pub fn with_failures(mut self, failures: impl IntoIterator<Item = Failure>) -> Self {
        self.failures.extend(failures);
        self
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{error_message}")]
    BadRequest {
        error_message: String,
        context: ErrorContext,
    },
    #[error("{error_message}")]
    NotFound {
        error_message: String,
        context: ErrorContext,
    },
    #[error("{error_message}")]
    InternalServerError {
        error_message: String,
        context: ErrorContext,
    },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::BadRequest {
            error_message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound {
            error_message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ServiceError::InternalServerError {
            error_message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Bad request carrying rule failures. A single failure lends its
    /// message to the error; several are summarised.
    pub fn validation(failures: Vec<Failure>) -> Self {
        let message = match failures.as_slice() {
            [only] => only.message.clone(),
            _ => constants::MESSAGE_VALIDATION_FAILED.to_string(),
        };
        ServiceError::bad_request(message).with_failures(failures)
    }

    pub fn with_context<F>(self, f: F) -> Self
    where
        F: FnOnce(ErrorContext) -> ErrorContext,
    {
        match self {
            ServiceError::BadRequest {
                error_message,
                context,
            } => ServiceError::BadRequest {
                error_message,
                context: f(context),
            },
            ServiceError::NotFound {
                error_message,
                context,
            } => ServiceError::NotFound {
                error_message,
                context: f(context),
            },
            ServiceError::InternalServerError {
                error_message,
                context,
            } => ServiceError::InternalServerError {
                error_message,
                context: f(context),
            },
        }
    }

    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        self.with_context(|ctx| ctx.with_tag(tag))
    }

    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        self.with_context(|ctx| ctx.with_detail(detail))
    }

    pub fn with_failures(self, failures: impl IntoIterator<Item = Failure>) -> Self {
        self.with_context(|ctx| ctx.with_failures(failures))
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::BadRequest { error_message, .. }
            | ServiceError::NotFound { error_message, .. }
            | ServiceError::InternalServerError { error_message, .. } => error_message,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            ServiceError::BadRequest { context, .. }
            | ServiceError::NotFound { context, .. }
            | ServiceError::InternalServerError { context, .. } => context,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest { .. } => constants::CODE_BAD_REQUEST,
            ServiceError::NotFound { .. } => constants::CODE_NOT_FOUND,
            ServiceError::InternalServerError { .. } => constants::CODE_INTERNAL,
        }
    }
}

impl From<Failure> for ServiceError {
    fn from(failure: Failure) -> Self {
        ServiceError::validation(vec![failure])
    }
}

impl From<Vec<Failure>> for ServiceError {
    fn from(failures: Vec<Failure>) -> Self {
        ServiceError::validation(failures)
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let context = self.context();

        // Internal details never leave the process.
        let message = match self {
            ServiceError::InternalServerError { error_message, .. } => {
                tracing::error!(
                    error = %error_message,
                    tags = ?context.tags(),
                    details = ?context.details(),
                    "internal server error"
                );
                constants::MESSAGE_INTERNAL_SERVER_ERROR
            }
            _ => self.message(),
        };

        let data = if context.failures().is_empty() {
            json!({ "code": self.code() })
        } else {
            json!({ "code": self.code(), "failures": context.failures() })
        };

        HttpResponse::build(self.status_code()).json(ResponseBody::new(message, data))
    }
}
