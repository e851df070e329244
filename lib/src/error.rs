use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced anywhere along the proving pipeline
#[derive(Error, Debug)]
pub enum ProverError {
    /// Malformed body, missing field, or a value that is not an integer
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Circuit name outside the fixed set
    #[error("Unknown circuit: {0}")]
    UnknownCircuit(String),

    /// An external binary reported a version other than the pinned one
    #[error("{tool} version mismatch: detected '{detected}', expected '{expected}'. {hint}")]
    ToolchainMismatch {
        tool: String,
        detected: String,
        expected: String,
        hint: String,
    },

    /// Non-zero exit (or spawn failure) of an external command
    #[error("Command `{command}` failed (exit code: {}): {stderr}", format_exit_code(.exit_code))]
    ExternalToolFailure {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// External command exceeded the configured wait
    #[error("Command `{command}` timed out after {limit:?}")]
    Timeout { command: String, limit: Duration },

    /// The circuit is known but its package is not deployed under the circuits root
    #[error("Circuit directory for {kind} not found at {}", .path.display())]
    CircuitDirMissing { kind: String, path: PathBuf },

    /// Prover output that cannot be split into field elements
    #[error("Malformed artifact: {0}")]
    MalformedArtifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parameter file encoding error: {0}")]
    Encoding(#[from] toml::ser::Error),
}

/// Result type alias for proving operations
pub type ProverResult<T> = Result<T, ProverError>;

fn format_exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

impl ProverError {
    /// Whether the failure was caused by the caller rather than the daemon
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    /// Get error code for logging and monitoring
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::UnknownCircuit(_) => "UNKNOWN_CIRCUIT",
            Self::ToolchainMismatch { .. } => "TOOLCHAIN_MISMATCH",
            Self::ExternalToolFailure { .. } => "EXTERNAL_TOOL_FAILURE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::CircuitDirMissing { .. } => "CIRCUIT_DIR_MISSING",
            Self::MalformedArtifact(_) => "MALFORMED_ARTIFACT",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Encoding(_) => "ENCODING_ERROR",
        }
    }
}
