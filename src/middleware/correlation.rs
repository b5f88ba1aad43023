//! Correlation-ID propagation
//!
//! Reads `X-Correlation-ID` from the request (or generates a fresh UUID),
//! makes it available to handlers as an extension, and echoes it on the
//! response. Every ProblemDetails body carries the same value.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// The correlation header
pub static CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Correlation id of the current request
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// The id string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Attach a correlation id to the request and echo it on the response
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(&CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(CorrelationId(id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response
            .headers_mut()
            .insert(CORRELATION_HEADER.clone(), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_accessor() {
        let id = CorrelationId("abc-123".to_string());
        assert_eq!(id.as_str(), "abc-123");
    }
}
