//! RFC-7807 problem responses
//!
//! Every surfaced failure becomes a `ProblemDetails` body carrying the
//! request's correlation id. Status mapping: validation-class failures are
//! 400, an exhausted fallback chain is 503, everything else is 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tollgate_llm::Error;
use tracing::{error, warn};

/// RFC-7807 body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// Short human-readable summary
    pub title: String,
    /// HTTP status code
    pub status: u16,
    /// Failure detail
    pub detail: String,
    /// Correlation id of the failed request
    pub correlation_id: String,
}

/// A failed request, ready to render
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    correlation_id: String,
}

impl ApiError {
    /// Wrap a gateway error with its correlation id
    #[must_use]
    pub fn new(error: Error, correlation_id: impl Into<String>) -> Self {
        Self {
            error,
            correlation_id: correlation_id.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match &self.error {
            Error::Validation(_) | Error::TokenLimitExceeded { .. } | Error::ModelUnknown(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::AllProvidersFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match &self.error {
            Error::Validation(_) => "Invalid request",
            Error::TokenLimitExceeded { .. } => "Token limit exceeded",
            Error::ModelUnknown(_) => "Unknown model",
            Error::AllProvidersFailed(_) => "All providers failed",
            _ => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(correlation_id = %self.correlation_id, error = %self.error, "Request failed");
        } else {
            warn!(correlation_id = %self.correlation_id, error = %self.error, "Request rejected");
        }

        let body = ProblemDetails {
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: self.error.to_string(),
            correlation_id: self.correlation_id,
        };
        (status, Json(body)).into_response()
    }
}
