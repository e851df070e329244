//! End-to-end proof generation for a single request.
//!
//! Stages: toolchain check → circuit lock → parameter file → `nargo execute`
//! → `bb prove` → artifact parsing. The lock is held from the parameter file
//! write until the artifacts have been read back.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::artifacts::{parse_proof, parse_public_inputs};
use crate::circuit::{CircuitKind, ProofRequest};
use crate::error::{ProverError, ProverResult};
use crate::inputs::write_inputs;
use crate::locks::CircuitLocks;
use crate::runner::{ExternalToolRunner, ToolInvocation};
use crate::toolchain::{ToolchainGate, ToolchainVersions};

/// Prover output directory, relative to the circuit directory
pub const TARGET_DIR: &str = "target";

/// Wire-ready proof and public inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProveResponse {
    pub circuit: CircuitKind,
    pub proof_hex: String,
    pub public_inputs_fields: Vec<String>,
}

/// Shared proving service state: one per process
pub struct ProofPipeline {
    circuits_root: PathBuf,
    runner: Arc<dyn ExternalToolRunner>,
    gate: ToolchainGate,
    locks: CircuitLocks,
}

impl ProofPipeline {
    pub fn new(
        circuits_root: impl Into<PathBuf>,
        runner: Arc<dyn ExternalToolRunner>,
        versions: ToolchainVersions,
    ) -> Self {
        Self {
            circuits_root: circuits_root.into(),
            runner,
            gate: ToolchainGate::new(versions),
            locks: CircuitLocks::new(),
        }
    }

    /// Working directory of a circuit (its Noir package)
    #[must_use]
    pub fn circuit_dir(&self, kind: CircuitKind) -> PathBuf {
        self.circuits_root.join(kind.as_str())
    }

    #[must_use]
    pub const fn locks(&self) -> &CircuitLocks {
        &self.locks
    }

    #[must_use]
    pub const fn gate(&self) -> &ToolchainGate {
        &self.gate
    }

    /// Check the toolchain without proving anything
    pub async fn preflight(&self) -> ProverResult<()> {
        self.gate.ensure_compatible(self.runner.as_ref()).await
    }

    /// Produce a proof for `request`.
    ///
    /// The toolchain is checked before the circuit lock is taken, so a
    /// mismatch never touches the working directory.
    #[instrument(skip(self, request), fields(circuit = %request.kind()), level = "info")]
    pub async fn prove(&self, request: &ProofRequest) -> ProverResult<ProveResponse> {
        self.preflight().await?;

        let kind = request.kind();
        self.locks
            .with_lock(kind, || self.prove_locked(request))
            .await
    }

    async fn prove_locked(&self, request: &ProofRequest) -> ProverResult<ProveResponse> {
        let kind = request.kind();
        let dir = self.circuit_dir(kind);
        if !dir.is_dir() {
            return Err(ProverError::CircuitDirMissing {
                kind: kind.to_string(),
                path: dir,
            });
        }

        write_inputs(&dir, request).await?;

        let target = dir.join(TARGET_DIR);
        for stale in ["proof", "public_inputs", "vk"] {
            remove_if_exists(&target.join(stale)).await?;
        }
        remove_if_exists(&target.join(format!("{kind}.gz"))).await?;

        let versions = self.gate.expected();
        info!("🧮 Generating witness for {}", kind);
        self.runner
            .run(&ToolInvocation::new(&versions.nargo_program, ["execute"]).in_dir(&dir))
            .await?;

        info!("🔐 Proving {}", kind);
        let bytecode = format!("./{TARGET_DIR}/{kind}.json");
        let witness = format!("./{TARGET_DIR}/{kind}.gz");
        let output = format!("./{TARGET_DIR}");
        self.runner
            .run(
                &ToolInvocation::new(
                    &versions.bb_program,
                    [
                        "prove",
                        "--scheme",
                        "ultra_honk",
                        "-b",
                        bytecode.as_str(),
                        "-w",
                        witness.as_str(),
                        "-o",
                        output.as_str(),
                    ],
                )
                .in_dir(&dir),
            )
            .await?;

        let proof = tokio::fs::read(target.join("proof")).await.map_err(|e| {
            ProverError::MalformedArtifact(format!("cannot read proof for {kind}: {e}"))
        })?;
        let public_inputs = tokio::fs::read(target.join("public_inputs")).await.map_err(|e| {
            ProverError::MalformedArtifact(format!("cannot read public inputs for {kind}: {e}"))
        })?;

        let response = ProveResponse {
            circuit: kind,
            proof_hex: parse_proof(&proof),
            public_inputs_fields: parse_public_inputs(&public_inputs)?,
        };
        info!(
            "✅ {} proof ready: {} bytes, {} public inputs",
            kind,
            proof.len(),
            response.public_inputs_fields.len()
        );
        Ok(response)
    }
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
