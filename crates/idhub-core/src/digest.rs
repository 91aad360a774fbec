//! # Content Digest: Content-Addressed Identifiers
//!
//! Defines `ContentDigest` and `DigestAlgorithm` for the credential content
//! store and the credential signing input.
//!
//! ## Invariant
//!
//! `ContentDigest` can only be computed from `CanonicalBytes`. This is
//! enforced by the signature of [`keccak256_digest()`].
//!
//! Keccak-256 is what secp256k1 signers in the Ethereum toolchain hash with,
//! and its multihash code (`0x1b`) is the one stored credentials may be
//! looked up by.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::canonical::CanonicalBytes;
use crate::error::ValidationError;

/// The hash algorithm used to produce a content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// Keccak-256 (pre-standard SHA-3, as used by Ethereum).
    Keccak256,
}

impl DigestAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keccak256 => "keccak-256",
        }
    }

    /// The multihash function code for this algorithm.
    pub fn multihash_code(&self) -> u8 {
        match self {
            Self::Keccak256 => 0x1b,
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content-addressed digest with its algorithm tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Create a new content digest from raw bytes and algorithm.
    pub fn new(algorithm: DigestAlgorithm, bytes: [u8; 32]) -> Self {
        Self { algorithm, bytes }
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a 64-character hex digest (an optional `0x` prefix is allowed).
    pub fn from_hex(algorithm: DigestAlgorithm, s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if trimmed.len() != 64 {
            return Err(ValidationError::InvalidDigest(format!(
                "expected 64 hex chars, got {}",
                trimmed.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(trimmed, &mut bytes)
            .map_err(|e| ValidationError::InvalidDigest(e.to_string()))?;
        Ok(Self::new(algorithm, bytes))
    }

    /// Parse the hex multihash form `<code><len><digest>` of a 32-byte
    /// `algorithm` digest.
    pub fn from_multihash_hex(
        algorithm: DigestAlgorithm,
        s: &str,
    ) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        let prefix = format!("{:02x}20", algorithm.multihash_code());
        let digest_hex = trimmed
            .get(..4)
            .filter(|p| p.eq_ignore_ascii_case(&prefix))
            .and_then(|_| trimmed.get(4..))
            .ok_or_else(|| {
                ValidationError::InvalidDigest(format!("expected {prefix} multihash prefix"))
            })?;
        Self::from_hex(algorithm, digest_hex)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Compute a Keccak-256 content digest from canonical bytes.
pub fn keccak256_digest(data: &CanonicalBytes) -> ContentDigest {
    let hash = Keccak256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest::new(DigestAlgorithm::Keccak256, bytes)
}
