//! Version gate for the external witness generator and prover.
//!
//! `nargo` is pinned to an exact release. `bb` ships rolling nightlies, so
//! only a version prefix is enforced for it. The check runs once per process
//! and is cached after the first success; a failed check is retried by the
//! next caller so that fixing the install does not require a restart.

use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use crate::error::{ProverError, ProverResult};
use crate::runner::{ExternalToolRunner, ToolInvocation};

pub const DEFAULT_NARGO_VERSION: &str = "1.0.0-beta.9";
pub const DEFAULT_BB_VERSION_PREFIX: &str = "0.87.";

/// Pinned toolchain expectations and the binaries to query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainVersions {
    pub nargo_program: String,
    pub nargo_version: String,
    pub bb_program: String,
    pub bb_version_prefix: String,
}

impl Default for ToolchainVersions {
    fn default() -> Self {
        Self {
            nargo_program: "nargo".to_string(),
            nargo_version: DEFAULT_NARGO_VERSION.to_string(),
            bb_program: "bb".to_string(),
            bb_version_prefix: DEFAULT_BB_VERSION_PREFIX.to_string(),
        }
    }
}

/// Extract the version from `nargo --version` output.
///
/// Recent releases print `nargo version = X` followed by compiler details.
#[must_use]
pub fn parse_nargo_version(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| {
            line.trim()
                .strip_prefix("nargo version")
                .and_then(|rest| rest.trim_start().strip_prefix('='))
                .map(|v| v.trim().to_string())
        })
        .or_else(|| first_line(stdout))
}

/// Extract the version from `bb --version` output
#[must_use]
pub fn parse_bb_version(stdout: &str) -> Option<String> {
    first_line(stdout).map(|line| line.strip_prefix('v').unwrap_or(line.as_str()).to_string())
}

fn first_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ToString::to_string)
}

/// Run-once compatibility check shared by every request
#[derive(Debug)]
pub struct ToolchainGate {
    expected: ToolchainVersions,
    verified: OnceCell<()>,
}

impl ToolchainGate {
    #[must_use]
    pub fn new(expected: ToolchainVersions) -> Self {
        Self {
            expected,
            verified: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn expected(&self) -> &ToolchainVersions {
        &self.expected
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.verified.initialized()
    }

    /// Verify the installed toolchain, querying the binaries only until the first success.
    ///
    /// Concurrent first callers wait on a single in-flight check.
    pub async fn ensure_compatible(&self, runner: &dyn ExternalToolRunner) -> ProverResult<()> {
        self.verified
            .get_or_try_init(|| self.check(runner))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, runner), level = "info")]
    async fn check(&self, runner: &dyn ExternalToolRunner) -> ProverResult<()> {
        let expected = &self.expected;

        let nargo = runner
            .run(&ToolInvocation::new(&expected.nargo_program, ["--version"]))
            .await?;
        let detected = parse_nargo_version(&nargo.stdout).unwrap_or_default();
        if detected != expected.nargo_version {
            warn!("⚠️ nargo {} does not match pinned {}", detected, expected.nargo_version);
            return Err(ProverError::ToolchainMismatch {
                tool: expected.nargo_program.clone(),
                detected,
                expected: expected.nargo_version.clone(),
                hint: format!(
                    "Install the pinned release with `noirup --version {}`.",
                    expected.nargo_version
                ),
            });
        }

        let bb = runner
            .run(&ToolInvocation::new(&expected.bb_program, ["--version"]))
            .await?;
        let detected_bb = parse_bb_version(&bb.stdout).unwrap_or_default();
        if !detected_bb.starts_with(&expected.bb_version_prefix) {
            warn!(
                "⚠️ bb {} does not match prefix {}",
                detected_bb, expected.bb_version_prefix
            );
            return Err(ProverError::ToolchainMismatch {
                tool: expected.bb_program.clone(),
                detected: detected_bb,
                expected: format!("{}*", expected.bb_version_prefix),
                hint: format!(
                    "Install a matching build with `bbup --version <version>` where the version starts with {}.",
                    expected.bb_version_prefix
                ),
            });
        }

        info!("✅ Toolchain verified: nargo {}, bb {}", detected, detected_bb);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubToolRunner;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[test]
    fn test_parse_nargo_version() {
        let stdout = "nargo version = 1.0.0-beta.9\nnoirc version = 1.0.0-beta.9+abc\n(git version hash: abc, is dirty: false)\n";
        assert_eq!(parse_nargo_version(stdout).as_deref(), Some("1.0.0-beta.9"));
        assert_eq!(parse_nargo_version("0.36.0\n").as_deref(), Some("0.36.0"));
        assert_eq!(parse_nargo_version(""), None);
    }

    #[test]
    fn test_parse_bb_version() {
        assert_eq!(parse_bb_version("0.87.4\n").as_deref(), Some("0.87.4"));
        assert_eq!(
            parse_bb_version("v0.87.0-nightly.20250610").as_deref(),
            Some("0.87.0-nightly.20250610")
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_success_is_cached() {
        let runner = StubToolRunner::new();
        let gate = ToolchainGate::new(ToolchainVersions::default());

        gate.ensure_compatible(&runner).await.unwrap();
        gate.ensure_compatible(&runner).await.unwrap();
        gate.ensure_compatible(&runner).await.unwrap();

        assert!(gate.is_verified());
        assert_eq!(runner.count_invocations("nargo --version"), 1);
        assert_eq!(runner.count_invocations("bb --version"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_callers_query_once() {
        let runner = Arc::new(StubToolRunner::new().with_delay(std::time::Duration::from_millis(20)));
        let gate = Arc::new(ToolchainGate::new(ToolchainVersions::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let runner = runner.clone();
                let gate = gate.clone();
                tokio::spawn(async move { gate.ensure_compatible(runner.as_ref()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(runner.count_invocations("nargo --version"), 1);
        assert_eq!(runner.count_invocations("bb --version"), 1);
    }

    #[tokio::test]
    async fn test_nargo_mismatch_reports_both_versions() {
        let runner = StubToolRunner::new().with_nargo_version("nargo version = 1.0.0-beta.3");
        let gate = ToolchainGate::new(ToolchainVersions::default());

        let err = gate.ensure_compatible(&runner).await.unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, ProverError::ToolchainMismatch { .. }));
        assert!(message.contains("1.0.0-beta.3"));
        assert!(message.contains(DEFAULT_NARGO_VERSION));
        assert!(message.contains("noirup"));
        assert!(!gate.is_verified());
        assert_eq!(runner.count_invocations("bb --version"), 0);
    }

    #[tokio::test]
    async fn test_bb_prefix_match() {
        let gate = ToolchainGate::new(ToolchainVersions::default());
        let nightly = StubToolRunner::new().with_bb_version("0.87.0-nightly.20250610");
        gate.ensure_compatible(&nightly).await.unwrap();

        let gate = ToolchainGate::new(ToolchainVersions::default());
        let stale = StubToolRunner::new().with_bb_version("0.82.2");
        let err = gate.ensure_compatible(&stale).await.unwrap_err();
        assert!(err.to_string().contains("0.82.2"));
        assert!(err.to_string().contains("0.87."));
    }

    #[tokio::test]
    async fn test_failed_check_is_retried() {
        let gate = ToolchainGate::new(ToolchainVersions::default());
        let broken = StubToolRunner::new().with_nargo_version("nargo version = 0.1.0");
        assert!(gate.ensure_compatible(&broken).await.is_err());

        let fixed = StubToolRunner::new();
        gate.ensure_compatible(&fixed).await.unwrap();
        assert_eq!(fixed.count_invocations("nargo --version"), 1);
    }
}
