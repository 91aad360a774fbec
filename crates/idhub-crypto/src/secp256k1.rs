//! # secp256k1 Signing and Public Key Recovery
//!
//! Provides secp256k1 key generation, recoverable signing, and public key
//! recovery for credential proofs.
//!
//! ## Security Invariant
//!
//! - Signing input MUST be `&CanonicalBytes`. The message digest is
//!   Keccak-256 over the canonical bytes, so callers cannot sign a
//!   non-canonical rendering of a credential.
//! - Private keys are never serialized or logged. `Secp256k1KeyPair` does
//!   not implement `Serialize` and its `Debug` output is redacted.
//! - Verification is done by *recovery*: the public key is derived from the
//!   signature and the digest, then compared against the expected key.
//!
//! ## Wire Formats
//!
//! - Public keys: SEC1 hex, compressed (33 bytes) or uncompressed (65
//!   bytes). Both parse to the same key.
//! - Signatures: 65 bytes `r || s || v` as hex, `v` in `{0, 1}`. Parsing
//!   also accepts the Ethereum `{27, 28}` form and a `0x` prefix.

use idhub_core::CanonicalBytes;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand_core::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CryptoError;
use crate::hash::keccak256;

/// A secp256k1 public key.
#[derive(Clone)]
pub struct Secp256k1PublicKey(VerifyingKey);

/// A 65-byte recoverable ECDSA signature: `r || s || v`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecoverableSignature(pub [u8; 65]);

/// A secp256k1 key pair for signing operations.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

// ---------------------------------------------------------------------------
// Secp256k1PublicKey impls
// ---------------------------------------------------------------------------

impl Secp256k1PublicKey {
    /// Parse a SEC1-encoded point (33 or 65 bytes).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidPublicKey(format!("{} bytes: {e}", bytes.len())))
    }

    /// Parse a hex-encoded SEC1 point, with or without a `0x` prefix.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = decode_hex(hex_str)?;
        Self::from_sec1_bytes(&bytes)
    }

    /// SEC1 encoding, compressed (33 bytes) or uncompressed (65 bytes).
    pub fn to_sec1_bytes(&self, compressed: bool) -> Vec<u8> {
        self.0.to_encoded_point(compressed).as_bytes().to_vec()
    }

    /// The 33-byte compressed encoding.
    pub fn to_compressed(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out.copy_from_slice(self.0.to_encoded_point(true).as_bytes());
        out
    }

    /// Compressed SEC1 hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    /// Uncompressed SEC1 hex (`04 || x || y`).
    pub fn to_uncompressed_hex(&self) -> String {
        hex::encode(self.to_sec1_bytes(false))
    }

    /// Access the underlying verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl PartialEq for Secp256k1PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_compressed() == other.to_compressed()
    }
}

impl Eq for Secp256k1PublicKey {}

impl std::hash::Hash for Secp256k1PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_compressed().hash(state);
    }
}

impl Serialize for Secp256k1PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Secp256k1PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Secp256k1PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secp256k1PublicKey({}...)", &self.to_hex()[..10])
    }
}

impl std::fmt::Display for Secp256k1PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// RecoverableSignature impls
// ---------------------------------------------------------------------------

impl RecoverableSignature {
    /// Render as lowercase hex (130 chars, no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex. `v` may be `0`/`1` or `27`/`28`; it is normalized to
    /// `0`/`1`.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = decode_hex(hex_str)?;
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidSignature(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 65];
        arr.copy_from_slice(&bytes);
        arr[64] = match arr[64] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            v => {
                return Err(CryptoError::InvalidSignature(format!(
                    "recovery id must be 0, 1, 27 or 28, got {v}"
                )))
            }
        };
        Ok(Self(arr))
    }

    /// The recovery id byte, `0` or `1`.
    pub fn v(&self) -> u8 {
        self.0[64]
    }

    fn split(&self) -> Result<(Signature, RecoveryId), CryptoError> {
        let sig = Signature::from_slice(&self.0[..64])
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let recid = RecoveryId::from_byte(self.0[64]).ok_or_else(|| {
            CryptoError::InvalidSignature(format!("bad recovery id {}", self.0[64]))
        })?;
        Ok((sig, recid))
    }
}

impl Serialize for RecoverableSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RecoverableSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecoverableSignature({}...)", &self.to_hex()[..8])
    }
}

// ---------------------------------------------------------------------------
// Secp256k1KeyPair impls
// ---------------------------------------------------------------------------

impl Secp256k1KeyPair {
    /// Generate a new random key pair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Load a key pair from a 32-byte private scalar in hex.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = decode_hex(hex_str)?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// Export the private scalar as hex. Only the `idhub key generate`
    /// command should call this.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// The public half of this key pair.
    pub fn public_key(&self) -> Secp256k1PublicKey {
        Secp256k1PublicKey(self.signing_key.verifying_key().clone())
    }

    /// Sign canonical bytes: Keccak-256 digest, then recoverable ECDSA.
    pub fn sign(&self, data: &CanonicalBytes) -> Result<RecoverableSignature, CryptoError> {
        self.sign_prehash(&keccak256(data.as_bytes()))
    }

    /// Sign a 32-byte digest that was computed by the caller.
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<RecoverableSignature, CryptoError> {
        let (sig, recid) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recid.to_byte();
        Ok(RecoverableSignature(out))
    }
}

impl std::fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secp256k1KeyPair(<private>)")
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Recover the signer's public key from a signature over canonical bytes.
pub fn recover(
    data: &CanonicalBytes,
    signature: &RecoverableSignature,
) -> Result<Secp256k1PublicKey, CryptoError> {
    recover_prehash(&keccak256(data.as_bytes()), signature)
}

/// Recover the signer's public key from a signature over a 32-byte digest.
pub fn recover_prehash(
    digest: &[u8; 32],
    signature: &RecoverableSignature,
) -> Result<Secp256k1PublicKey, CryptoError> {
    let (sig, recid) = signature.split()?;
    VerifyingKey::recover_from_prehash(digest, &sig, recid)
        .map(Secp256k1PublicKey)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, CryptoError> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| CryptoError::HexDecode(e.to_string()))
}
