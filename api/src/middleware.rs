use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::debug;

// ============================================================================
// CORS CONFIGURATION
// ============================================================================

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const ALLOWED_HEADERS: &str = "content-type";
pub const ALLOWED_METHODS: &str = "POST, OPTIONS";

/// Configured origin that cannot be sent as a header value
#[derive(Error, Debug)]
#[error("Invalid CORS origin {origin:?}: not a valid header value")]
pub struct InvalidCorsOrigin {
    pub origin: String,
}

/// Headers stamped on every response
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allow_origin: HeaderValue,
}

impl CorsConfig {
    pub fn new(origin: &str) -> Result<Self, InvalidCorsOrigin> {
        let allow_origin = HeaderValue::from_str(origin).map_err(|_| InvalidCorsOrigin {
            origin: origin.to_string(),
        })?;
        Ok(Self { allow_origin })
    }

    /// One overriding layer per header, applied to every response including pre-flight
    #[must_use]
    pub fn header_layers(&self) -> Vec<SetResponseHeaderLayer<HeaderValue>> {
        let stamp = |name: HeaderName, value: HeaderValue| SetResponseHeaderLayer::overriding(name, value);
        vec![
            stamp(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE)),
            stamp(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone()),
            stamp(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            ),
            stamp(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            ),
        ]
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: HeaderValue::from_static("*"),
        }
    }
}

// ============================================================================
// PRE-FLIGHT MIDDLEWARE
// ============================================================================

/// Answers `OPTIONS` on any path with `{"ok": true}`.
///
/// Pre-flight never reaches the router, so it cannot touch circuit locks.
pub async fn preflight_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        debug!("Pre-flight for {}", request.uri().path());
        return Json(json!({ "ok": true })).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_origin_is_kept() {
        let cors = CorsConfig::new("https://game.example").unwrap();
        assert_eq!(cors.allow_origin, "https://game.example");
    }

    #[test]
    fn test_invalid_origin_is_rejected_not_widened() {
        let err = CorsConfig::new("https://game.example\n").unwrap_err();
        assert_eq!(err.origin, "https://game.example\n");
        assert!(err.to_string().contains("Invalid CORS origin"));
    }

    #[test]
    fn test_default_allows_any_origin() {
        assert_eq!(CorsConfig::default().allow_origin, "*");
        assert_eq!(CorsConfig::default().header_layers().len(), 4);
    }
}
