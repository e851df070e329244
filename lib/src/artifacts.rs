//! Conversion of the prover's binary outputs into wire form.

use crate::error::{ProverError, ProverResult};

/// Size of one big-endian field element in the public-inputs file
pub const FIELD_ELEMENT_BYTES: usize = 32;

/// Lowercase hex of the raw proof bytes, no prefix or separators
#[must_use]
pub fn parse_proof(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Split the public-inputs file into `0x`-prefixed 32-byte field elements, in file order
pub fn parse_public_inputs(bytes: &[u8]) -> ProverResult<Vec<String>> {
    if bytes.len() % FIELD_ELEMENT_BYTES != 0 {
        return Err(ProverError::MalformedArtifact(format!(
            "public inputs length {} is not a multiple of {FIELD_ELEMENT_BYTES}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(FIELD_ELEMENT_BYTES)
        .map(|chunk| format!("0x{}", hex::encode(chunk)))
        .collect())
}
