use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::environment::IsolatedEnvironment;
use crate::error::ProverResult;
use crate::pipeline::ProofPipeline;
use crate::runner::ProcessRunner;
use crate::toolchain::ToolchainVersions;

/// Everything needed to assemble a production pipeline
#[derive(Debug, Clone)]
pub struct ProverConfig {
    /// Root holding one Noir package per circuit, named after the circuit
    pub circuits_dir: PathBuf,

    /// Private root for HOME/XDG redirection of the toolchain
    pub isolation_dir: PathBuf,

    /// Upper bound on each external command; `None` waits forever
    pub command_timeout: Option<Duration>,

    pub versions: ToolchainVersions,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            circuits_dir: PathBuf::from("circuits"),
            isolation_dir: PathBuf::from(".prover-env"),
            command_timeout: Some(Duration::from_secs(600)),
            versions: ToolchainVersions::default(),
        }
    }
}

impl ProverConfig {
    /// Prepare the isolated environment and build a pipeline backed by real subprocesses
    pub fn build_pipeline(&self) -> ProverResult<ProofPipeline> {
        let environment = IsolatedEnvironment::new(&self.isolation_dir)?;
        environment.prepare()?;

        info!(
            "📁 Circuits at {}, command timeout {:?}",
            self.circuits_dir.display(),
            self.command_timeout
        );
        let runner = ProcessRunner::new(environment, self.command_timeout);
        Ok(ProofPipeline::new(
            self.circuits_dir.clone(),
            Arc::new(runner),
            self.versions.clone(),
        ))
    }
}
