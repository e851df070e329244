//! Deterministic stand-in for the external toolchain.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{ProverError, ProverResult};
use crate::runner::{ExternalToolRunner, ToolInvocation, ToolOutput};
use crate::toolchain::{DEFAULT_BB_VERSION_PREFIX, DEFAULT_NARGO_VERSION};

/// One recorded call with its start and end instants
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub started: Instant,
    pub finished: Instant,
}

/// Records calls, answers version queries, and writes fixed artifacts on `bb prove`
#[derive(Debug)]
pub struct StubToolRunner {
    nargo_version: String,
    bb_version: String,
    delay: Duration,
    proof: Vec<u8>,
    public_inputs: Vec<u8>,
    fail_on: Option<String>,
    records: Mutex<Vec<InvocationRecord>>,
}

impl Default for StubToolRunner {
    fn default() -> Self {
        let mut public_inputs = vec![0x01; 32];
        public_inputs.extend([0x02; 32]);
        Self {
            nargo_version: format!("nargo version = {DEFAULT_NARGO_VERSION}\nnoirc version = {DEFAULT_NARGO_VERSION}"),
            bb_version: format!("{DEFAULT_BB_VERSION_PREFIX}0"),
            delay: Duration::ZERO,
            proof: (0u8..32).collect(),
            public_inputs,
            fail_on: None,
            records: Mutex::new(Vec::new()),
        }
    }
}

impl StubToolRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stdout returned for `nargo --version`
    #[must_use]
    pub fn with_nargo_version(mut self, stdout: impl Into<String>) -> Self {
        self.nargo_version = stdout.into();
        self
    }

    /// Raw stdout returned for `bb --version`
    #[must_use]
    pub fn with_bb_version(mut self, stdout: impl Into<String>) -> Self {
        self.bb_version = stdout.into();
        self
    }

    /// Sleep this long inside every invocation
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_artifacts(mut self, proof: Vec<u8>, public_inputs: Vec<u8>) -> Self {
        self.proof = proof;
        self.public_inputs = public_inputs;
        self
    }

    /// Fail every command whose command line starts with `prefix`
    #[must_use]
    pub fn failing_on(mut self, prefix: impl Into<String>) -> Self {
        self.fail_on = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn records(&self) -> Vec<InvocationRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of calls whose command line starts with `prefix`
    #[must_use]
    pub fn count_invocations(&self, prefix: &str) -> usize {
        self.records()
            .iter()
            .filter(|r| r.command.starts_with(prefix))
            .count()
    }

    fn write_artifacts(&self, invocation: &ToolInvocation) -> ProverResult<()> {
        let base = invocation.working_dir.clone().unwrap_or_default();
        let out_dir = invocation
            .args
            .iter()
            .position(|a| a == "-o")
            .and_then(|i| invocation.args.get(i + 1))
            .map_or_else(|| base.clone(), |dir| base.join(dir));
        std::fs::create_dir_all(&out_dir)?;
        std::fs::write(out_dir.join("proof"), &self.proof)?;
        std::fs::write(out_dir.join("public_inputs"), &self.public_inputs)?;
        Ok(())
    }

    fn write_witness(invocation: &ToolInvocation) -> ProverResult<()> {
        let base = invocation.working_dir.clone().unwrap_or_default();
        let name = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "witness".to_string());
        let target = base.join("target");
        std::fs::create_dir_all(&target)?;
        std::fs::write(target.join(format!("{name}.gz")), b"witness")?;
        Ok(())
    }
}

#[async_trait]
impl ExternalToolRunner for StubToolRunner {
    async fn run(&self, invocation: &ToolInvocation) -> ProverResult<ToolOutput> {
        let command = invocation.command_line();
        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = if self.fail_on.as_deref().is_some_and(|p| command.starts_with(p)) {
            Err(ProverError::ExternalToolFailure {
                command: command.clone(),
                exit_code: Some(1),
                stderr: "stub failure".to_string(),
            })
        } else {
            let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
            match (Path::new(&invocation.program).file_name(), args.as_slice()) {
                (Some(p), ["--version"]) if p == "nargo" => Ok(self.nargo_version.clone()),
                (Some(p), ["--version"]) if p == "bb" => Ok(self.bb_version.clone()),
                (Some(p), ["execute", ..]) if p == "nargo" => Self::write_witness(invocation).map(|()| String::new()),
                (Some(p), ["prove", ..]) if p == "bb" => self.write_artifacts(invocation).map(|()| String::new()),
                _ => Ok(String::new()),
            }
        };

        if let Ok(mut records) = self.records.lock() {
            records.push(InvocationRecord {
                command,
                working_dir: invocation.working_dir.clone(),
                started,
                finished: Instant::now(),
            });
        }

        result.map(|stdout| ToolOutput {
            stdout,
            exit_code: 0,
        })
    }
}
