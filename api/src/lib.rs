#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]

pub mod middleware;
pub mod rest;
pub mod server;


// Re-export main API types for convenience
pub use middleware::{preflight_middleware, CorsConfig, InvalidCorsOrigin};
pub use rest::{create_router, prove_path, ApiError, ApiState, ErrorResponse};
pub use server::{ApiServer, ApiServerBuilder, ApiServerConfig};

// Re-export proving types that the API uses
pub use prover_lib::{CircuitKind, ProofPipeline, ProveResponse, ProverConfig};
