//! Circuit identities and the typed requests accepted for each of them.

use std::fmt;
use std::str::FromStr;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{ProverError, ProverResult};

/// The closed set of circuits this daemon can prove
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[cfg_attr(feature = "clap", value(rename_all = "snake_case"))]
pub enum CircuitKind {
    PingDistance,
    TurnStatus,
    MoveProof,
}

const PING_DISTANCE_FIELDS: &[&str] = &["x", "y", "salt", "tower_x", "tower_y", "session_id", "turn"];
const TURN_STATUS_FIELDS: &[&str] = &["x", "y", "salt", "cx", "cy", "session_id", "turn"];
const MOVE_PROOF_FIELDS: &[&str] = &[
    "x_old",
    "y_old",
    "salt_old",
    "x_new",
    "y_new",
    "salt_new",
    "session_id",
    "turn",
];

impl CircuitKind {
    pub const ALL: [Self; 3] = [Self::PingDistance, Self::TurnStatus, Self::MoveProof];

    /// Wire name, also the name of the circuit's working directory
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PingDistance => "ping_distance",
            Self::TurnStatus => "turn_status",
            Self::MoveProof => "move_proof",
        }
    }

    /// Parameter names in the order they are written to the parameter file
    #[must_use]
    pub const fn field_names(&self) -> &'static [&'static str] {
        match self {
            Self::PingDistance => PING_DISTANCE_FIELDS,
            Self::TurnStatus => TURN_STATUS_FIELDS,
            Self::MoveProof => MOVE_PROOF_FIELDS,
        }
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitKind {
    type Err = ProverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProverError::UnknownCircuit(s.to_string()))
    }
}

// ============================================================================
// FIELD VALUES
// ============================================================================

/// An arbitrary-precision integer kept in its decimal form.
///
/// Accepts JSON integers of any size as well as decimal strings, so values
/// beyond `u64`/`f64` range survive the trip into the parameter file intact.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldValue(String);

impl FieldValue {
    /// Parse a decimal integer with an optional leading minus sign
    pub fn parse(raw: &str) -> Result<Self, String> {
        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("expected an integer, got '{raw}'"));
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for FieldValue {
    type Err = ProverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).map_err(ProverError::InvalidRequest)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(number) => Self::parse(&number.to_string()).map_err(D::Error::custom),
            Value::String(text) => Self::parse(text.trim()).map_err(D::Error::custom),
            other => Err(D::Error::custom(format!("expected an integer, got {other}"))),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

/// Inputs for `ping_distance`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingDistanceInputs {
    pub x: FieldValue,
    pub y: FieldValue,
    pub salt: FieldValue,
    pub tower_x: FieldValue,
    pub tower_y: FieldValue,
    pub session_id: FieldValue,
    pub turn: FieldValue,
}

/// Inputs for `turn_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnStatusInputs {
    pub x: FieldValue,
    pub y: FieldValue,
    pub salt: FieldValue,
    pub cx: FieldValue,
    pub cy: FieldValue,
    pub session_id: FieldValue,
    pub turn: FieldValue,
}

/// Inputs for `move_proof`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveProofInputs {
    pub x_old: FieldValue,
    pub y_old: FieldValue,
    pub salt_old: FieldValue,
    pub x_new: FieldValue,
    pub y_new: FieldValue,
    pub salt_new: FieldValue,
    pub session_id: FieldValue,
    pub turn: FieldValue,
}

/// A structurally valid proving request for one circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofRequest {
    PingDistance(PingDistanceInputs),
    TurnStatus(TurnStatusInputs),
    MoveProof(MoveProofInputs),
}

impl ProofRequest {
    /// Decode a JSON body for the given circuit.
    ///
    /// Every field is required; unknown extra fields are ignored.
    pub fn from_json(kind: CircuitKind, body: &[u8]) -> ProverResult<Self> {
        let invalid = |e: serde_json::Error| ProverError::InvalidRequest(e.to_string());
        let request = match kind {
            CircuitKind::PingDistance => Self::PingDistance(serde_json::from_slice(body).map_err(invalid)?),
            CircuitKind::TurnStatus => Self::TurnStatus(serde_json::from_slice(body).map_err(invalid)?),
            CircuitKind::MoveProof => Self::MoveProof(serde_json::from_slice(body).map_err(invalid)?),
        };
        Ok(request)
    }

    #[must_use]
    pub const fn kind(&self) -> CircuitKind {
        match self {
            Self::PingDistance(_) => CircuitKind::PingDistance,
            Self::TurnStatus(_) => CircuitKind::TurnStatus,
            Self::MoveProof(_) => CircuitKind::MoveProof,
        }
    }
}
