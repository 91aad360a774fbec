//! # Identity Newtypes
//!
//! [`Did`] is a validated W3C Decentralized Identifier. [`IdentityKey`] is
//! its deterministic fixed-width binary encoding, used both as the storage
//! namespace of the identity's claim tree and as the identity field inside
//! tree claims.
//!
//! The binary encoding is `SHA-256(did_string)`. A fixed width matters:
//! with variable-length raw encodings, `did:a:b` would be a byte prefix of
//! `did:a:bc` and the two identities' namespaces would overlap.
//!
//! Reference: <https://www.w3.org/TR/did-core/#did-syntax>

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ValidationError;

/// The DID method used for identities minted by this hub.
pub const ETHURI_METHOD: &str = "ethuri";

/// W3C Decentralized Identifier (DID).
///
/// Format: `did:<method>:<method-specific-id>`, where the method is
/// lowercase alphanumeric and the method-specific id is non-empty and made
/// of `[A-Za-z0-9._:%-]`. DID URLs (with `#fragment`, `/path` or `?query`)
/// are rejected by [`Did::new`]; use [`Did::from_did_url`] to strip them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Did(String);

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl Did {
    /// Create a DID from a string, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDid`] if the string does not match
    /// the `did:method:identifier` format.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// Parse a DID URL such as `did:ethuri:123#keys-1`, keeping only the DID.
    pub fn from_did_url(url: &str) -> Result<Self, ValidationError> {
        let end = url.find(['#', '/', '?']).unwrap_or(url.len());
        Self::new(&url[..end])
    }

    /// Mint a fresh `did:ethuri:<uuid-v4>` identifier.
    pub fn generate_ethuri() -> Self {
        Self(format!("did:{ETHURI_METHOD}:{}", Uuid::new_v4()))
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let invalid = || ValidationError::InvalidDid(s.to_string());
        let rest = s.strip_prefix("did:").ok_or_else(invalid)?;
        let (method, id) = rest.split_once(':').ok_or_else(invalid)?;
        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(invalid());
        }
        if id.is_empty()
            || id.ends_with(':')
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '%' | '-'))
        {
            return Err(invalid());
        }
        Ok(())
    }

    /// The DID method name (`ethuri` for `did:ethuri:...`).
    pub fn method(&self) -> &str {
        // Validated on construction: "did:" + method + ":" + id.
        self.0[4..].split(':').next().unwrap_or_default()
    }

    /// Access the DID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The fixed-width binary encoding of this identifier.
    pub fn binary(&self) -> IdentityKey {
        IdentityKey::from(self)
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Did {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// The 32-byte binary encoding of a [`Did`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey([u8; 32]);

impl IdentityKey {
    /// Wrap raw bytes previously produced by [`Did::binary`].
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<&Did> for IdentityKey {
    fn from(did: &Did) -> Self {
        let hash = Sha256::digest(did.as_str().as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&hash);
        Self(out)
    }
}

impl Serialize for IdentityKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for IdentityKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(raw.trim_start_matches("0x"), &mut out)
            .map_err(serde::de::Error::custom)?;
        Ok(Self(out))
    }
}

impl std::fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdentityKey({}...)", &self.to_hex()[..16])
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_dids() {
        for s in [
            "did:example:abc",
            "did:ethuri:e7ab0c43-15cb-4d8b-9e5a-3f0c3c1e6d7a",
            "did:web:example.com:users:alice",
            "did:key:z6MkTest_1%20",
        ] {
            let did = Did::new(s).unwrap();
            assert_eq!(did.as_str(), s);
        }
    }

    #[test]
    fn rejects_malformed_dids() {
        for s in [
            "",
            "did:",
            "did:example",
            "did:example:",
            "did::abc",
            "did:Example:abc",
            "DID:example:abc",
            "did:example:abc#frag",
            "did:example:abc:",
            "example:abc",
        ] {
            assert!(Did::new(s).is_err(), "{s:?} should be rejected");
        }
    }

    #[test]
    fn did_url_fragment_is_stripped() {
        let did = Did::from_did_url("did:ethuri:abc#keys-1").unwrap();
        assert_eq!(did.as_str(), "did:ethuri:abc");
        let did = Did::from_did_url("did:ethuri:abc/path?x=1").unwrap();
        assert_eq!(did.as_str(), "did:ethuri:abc");
    }

    #[test]
    fn generated_ethuri_dids_are_valid_and_unique() {
        let a = Did::generate_ethuri();
        let b = Did::generate_ethuri();
        assert_ne!(a, b);
        assert_eq!(a.method(), "ethuri");
        assert!(Did::new(a.as_str()).is_ok());
    }

    #[test]
    fn serde_rejects_invalid_did() {
        let ok: Did = serde_json::from_str(r#""did:example:abc""#).unwrap();
        assert_eq!(ok.method(), "example");
        assert!(serde_json::from_str::<Did>(r#""nope""#).is_err());
    }

    #[test]
    fn binary_encoding_is_deterministic_and_distinct() {
        let a = Did::new("did:example:abc").unwrap();
        let b = Did::new("did:example:abcd").unwrap();
        assert_eq!(a.binary(), Did::new("did:example:abc").unwrap().binary());
        assert_ne!(a.binary(), b.binary());
        assert_eq!(a.binary().to_hex().len(), 64);
    }

    #[test]
    fn identity_key_serializes_as_hex() {
        let key = Did::new("did:example:abc").unwrap().binary();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key.to_hex()));
        let back: IdentityKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
