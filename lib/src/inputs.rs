//! Parameter-file rendering for the witness generator.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::circuit::ProofRequest;
use crate::error::ProverResult;

/// File the witness generator reads its inputs from
pub const PARAMETER_FILE: &str = "Prover.toml";

/// Render the request as TOML, one quoted decimal per field in declaration order
pub fn render_inputs(request: &ProofRequest) -> ProverResult<String> {
    let rendered = match request {
        ProofRequest::PingDistance(inputs) => toml::to_string_pretty(inputs)?,
        ProofRequest::TurnStatus(inputs) => toml::to_string_pretty(inputs)?,
        ProofRequest::MoveProof(inputs) => toml::to_string_pretty(inputs)?,
    };
    Ok(rendered)
}

/// Write the parameter file into `circuit_dir`, replacing any previous one.
///
/// Callers must hold the circuit's lock.
pub async fn write_inputs(circuit_dir: &Path, request: &ProofRequest) -> ProverResult<PathBuf> {
    let path = circuit_dir.join(PARAMETER_FILE);
    let content = render_inputs(request)?;
    debug!("Writing {} ({} bytes)", PARAMETER_FILE, content.len());
    tokio::fs::write(&path, &content).await?;
    debug!("Wrote {} inputs to {}", request.kind(), path.display());
    Ok(path)
}
