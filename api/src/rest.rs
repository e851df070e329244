use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use prover_lib::{CircuitKind, ProofPipeline, ProofRequest, ProveResponse, ProverError};

// ============================================================================
// API STATE
// ============================================================================

/// API state shared by every handler
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<ProofPipeline>,
}

// ============================================================================
// ERRORS
// ============================================================================

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Failures surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{}", .0.body_text())]
    Body(#[from] BytesRejection),

    #[error(transparent)]
    Prover(#[from] ProverError),
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Body(rejection) => rejection.status(),
            Self::Prover(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Prover(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Route for a circuit's proving endpoint
#[must_use]
pub fn prove_path(kind: CircuitKind) -> String {
    format!("/prove/{kind}")
}

/// One POST endpoint per circuit; everything else is 404/405
pub fn create_router(state: ApiState) -> Router {
    let mut router = Router::new();
    for kind in CircuitKind::ALL {
        router = router.route(
            &prove_path(kind),
            post(move |State(state): State<ApiState>, body: Result<Bytes, BytesRejection>| {
                prove_endpoint(state, kind, body)
            })
            .fallback(method_not_allowed),
        );
    }
    router.fallback(not_found).with_state(state)
}

// ============================================================================
// ENDPOINT HANDLERS
// ============================================================================

/// Decode, prove and encode a single request.
///
/// The body is fully validated before the pipeline (and its lock) is touched.
#[instrument(skip(state, body), fields(circuit = %kind), level = "info")]
async fn prove_endpoint(
    state: ApiState,
    kind: CircuitKind,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ProveResponse>, ApiError> {
    let body = body?;
    let request = ProofRequest::from_json(kind, &body).map_err(|e| {
        warn!("Rejected {} request: {}", kind, e);
        e
    })?;

    info!("📥 API: Proof requested for {}", kind);
    match state.pipeline.prove(&request).await {
        Ok(response) => {
            info!("✅ API: Proof returned for {}", kind);
            Ok(Json(response))
        }
        Err(e) => {
            error!("❌ API: Proof for {} failed [{}]: {}", kind, e.error_code(), e);
            Err(e.into())
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
