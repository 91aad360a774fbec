//! # Linked-Data Proofs
//!
//! The proof block attached to a content credential. Only the secp256k1
//! suite is produced or accepted by the hub, but the `type` field is kept
//! as a string so that credentials carrying other suites still parse and
//! can be rejected with a precise error instead of a deserialization
//! failure.

use serde::{Deserialize, Serialize};

use idhub_core::{Did, Timestamp};

/// Linked-data signature suite for secp256k1 recoverable signatures.
pub const SECP256K1_SIGNATURE_2019: &str = "EcdsaSecp256k1Signature2019";

/// Key suite type for secp256k1 verification keys in DID documents.
pub const SECP256K1_VERIFICATION_KEY_2019: &str = "EcdsaSecp256k1VerificationKey2019";

/// A linked-data proof.
///
/// `proof_value` is the hex-encoded 65-byte `r || s || v` signature over
/// Keccak-256 of the credential's signing input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedDataProof {
    /// The signature suite.
    #[serde(rename = "type")]
    pub proof_type: String,

    /// DID (or DID URL) of the signer.
    pub creator: String,

    /// When the proof was created (UTC, seconds precision).
    pub created: Timestamp,

    /// Hex-encoded signature.
    #[serde(rename = "proofValue")]
    pub proof_value: String,

    /// Optional replay-protection nonce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Optional domain the proof is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl LinkedDataProof {
    /// An unsigned secp256k1 proof shell for `creator`.
    pub fn new_secp256k1(creator: &Did, created: Option<Timestamp>) -> Self {
        Self {
            proof_type: SECP256K1_SIGNATURE_2019.to_string(),
            creator: creator.to_string(),
            created: created.unwrap_or_else(Timestamp::now),
            proof_value: String::new(),
            nonce: None,
            domain: None,
        }
    }

    /// True if this proof uses the secp256k1 signature suite.
    pub fn is_secp256k1(&self) -> bool {
        self.proof_type == SECP256K1_SIGNATURE_2019
    }
}
