#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::ref_option)]

pub mod artifacts;
pub mod circuit;
pub mod config;
pub mod environment;
pub mod error;
pub mod inputs;
pub mod locks;
pub mod pipeline;
pub mod runner;
pub mod toolchain;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod pipeline_tests;

pub use artifacts::{parse_proof, parse_public_inputs};
pub use circuit::{CircuitKind, FieldValue, ProofRequest};
pub use config::ProverConfig;
pub use environment::IsolatedEnvironment;
pub use error::{ProverError, ProverResult};
pub use inputs::{render_inputs, write_inputs, PARAMETER_FILE};
pub use locks::{CircuitLease, CircuitLocks};
pub use pipeline::{ProofPipeline, ProveResponse};
pub use runner::{ExternalToolRunner, ProcessRunner, ToolInvocation, ToolOutput};
pub use toolchain::{ToolchainGate, ToolchainVersions};
