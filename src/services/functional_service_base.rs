//! Shared helpers for the service layer.

use crate::error::ServiceError;

/// Logs an error result without changing it, so `?` can follow directly.
pub trait FunctionalErrorHandling<T> {
    fn log_error(self, operation: &str) -> Result<T, ServiceError>;
}

impl<T> FunctionalErrorHandling<T> for Result<T, ServiceError> {
    fn log_error(self, operation: &str) -> Result<T, ServiceError> {
        self.inspect_err(|error| match error {
            ServiceError::InternalServerError { context, .. } => tracing::error!(
                operation,
                error = %error,
                tags = ?context.tags(),
                "operation failed"
            ),
            ServiceError::BadRequest { context, .. } => tracing::info!(
                operation,
                error = %error,
                failures = context.failures().len(),
                "request rejected"
            ),
            ServiceError::NotFound { .. } => {
                tracing::debug!(operation, error = %error, "resource not found")
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_error_passes_results_through() {
        let ok: Result<u8, ServiceError> = Ok(3);
        assert_eq!(ok.log_error("ok").unwrap(), 3);

        let err: Result<u8, ServiceError> = Err(ServiceError::not_found("gone"));
        let err = err.log_error("lookup").unwrap_err();
        assert_eq!(err.message(), "gone");
    }
}
