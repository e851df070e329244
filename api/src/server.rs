use axum::{extract::DefaultBodyLimit, middleware::from_fn, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::middleware::{preflight_middleware, CorsConfig, InvalidCorsOrigin};
use crate::rest::ApiState;
use prover_lib::ProofPipeline;

// ============================================================================
// API SERVER CONFIGURATION
// ============================================================================

/// Configuration for the proving API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server binding configuration
    pub host: String,
    pub port: u16,

    /// Value of `access-control-allow-origin`
    pub cors_origin: String,

    pub max_request_size_bytes: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8788,
            cors_origin: "*".to_string(),
            max_request_size_bytes: 64 * 1024,
        }
    }
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

/// Proving API server
pub struct ApiServer {
    config: ApiServerConfig,
    cors: CorsConfig,
    state: ApiState,
}

impl ApiServer {
    /// Create a server around an already assembled pipeline.
    ///
    /// Fails if the CORS origin cannot be sent as a header value.
    pub fn new(config: ApiServerConfig, pipeline: Arc<ProofPipeline>) -> Result<Self, InvalidCorsOrigin> {
        info!("🚀 Creating proving API server");
        let cors = CorsConfig::new(&config.cors_origin)?;
        Ok(Self {
            config,
            cors,
            state: ApiState { pipeline },
        })
    }

    /// Build the complete router with all endpoints
    #[instrument(skip(self), level = "info")]
    pub fn create_router(&self) -> Router {
        info!("🔧 Building API router");
        let router = crate::rest::create_router(self.state.clone());
        let router = self.add_middleware(router);
        info!("✅ API router built successfully");
        router
    }

    /// Add middleware layers to the router
    fn add_middleware(&self, router: Router) -> Router {
        let mut router = router
            .layer(DefaultBodyLimit::max(self.config.max_request_size_bytes))
            .layer(from_fn(preflight_middleware));
        for layer in self.cors.header_layers() {
            router = router.layer(layer);
        }
        router.layer(TraceLayer::new_for_http())
    }

    /// Get server binding address
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Get API state reference
    #[must_use]
    pub const fn state(&self) -> &ApiState {
        &self.state
    }

    /// Get server configuration
    #[must_use]
    pub const fn config(&self) -> &ApiServerConfig {
        &self.config
    }
}

// ============================================================================
// SERVER BUILDER UTILITIES
// ============================================================================

/// Builder for API server configuration
pub struct ApiServerBuilder {
    config: ApiServerConfig,
}

impl ApiServerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ApiServerConfig::default(),
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.cors_origin = origin.into();
        self
    }

    #[must_use]
    pub const fn max_request_size(mut self, bytes: usize) -> Self {
        self.config.max_request_size_bytes = bytes;
        self
    }

    /// Build the API server around `pipeline`
    pub fn build(self, pipeline: Arc<ProofPipeline>) -> Result<ApiServer, InvalidCorsOrigin> {
        ApiServer::new(self.config, pipeline)
    }
}

impl Default for ApiServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
