//! Pipeline rejection taxonomy.
//!
//! Every stage failure maps to one variant with a fixed status code and a
//! machine-parseable JSON body. No stage downgrades a rejection to a warning,
//! and configuration defects fail loudly instead of allowing the request.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Why the pipeline refused a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// Caller exhausted its token bucket; recoverable by backing off.
    #[error("rate limit exceeded ({limit}/min)")]
    RateLimited { limit: u32 },

    /// Client IP not on the allow-list for a guarded path.
    #[error("client IP not whitelisted")]
    IpDenied,

    /// Missing, stale, or forged request signature.
    #[error("invalid request signature")]
    SignatureInvalid,

    /// The route requires an authenticated identity.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated but not the owner / lacking the capability.
    #[error("access denied")]
    Forbidden,

    /// A route declared an ownership check on a parameter it does not have.
    /// Programming defect: surfaces as a 500, never a silent allow.
    #[error("route declares ownership check on missing path parameter {0:?}")]
    Configuration(String),
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        match self {
            PipelineError::RateLimited { limit } => {
                let body = json!({
                    "error": format!("Rate limit exceeded. Maximum {} requests per minute.", limit)
                });
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                let headers = response.headers_mut();
                if let Ok(v) = HeaderValue::from_str(&limit.to_string()) {
                    headers.insert("X-RateLimit-Limit", v);
                }
                headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
                response
            }
            PipelineError::IpDenied => (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "Access denied. Your IP is not whitelisted."})),
            )
                .into_response(),
            PipelineError::SignatureInvalid => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid request signature"})),
            )
                .into_response(),
            PipelineError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Authentication required"})),
            )
                .into_response(),
            PipelineError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "Access Denied"})),
            )
                .into_response(),
            PipelineError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal configuration error"})),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (PipelineError::RateLimited { limit: 10 }, StatusCode::TOO_MANY_REQUESTS),
            (PipelineError::IpDenied, StatusCode::FORBIDDEN),
            (PipelineError::SignatureInvalid, StatusCode::UNAUTHORIZED),
            (PipelineError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (PipelineError::Forbidden, StatusCode::FORBIDDEN),
            (PipelineError::Configuration("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_rate_limited_headers() {
        let response = PipelineError::RateLimited { limit: 60 }.into_response();
        assert_eq!(response.headers()["X-RateLimit-Limit"], "60");
        assert_eq!(response.headers()["X-RateLimit-Remaining"], "0");
    }
}
