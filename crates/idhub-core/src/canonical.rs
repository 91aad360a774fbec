//! # Canonical Serialization: JCS Byte Production
//!
//! Defines `CanonicalBytes`, the sole construction path for bytes that are
//! hashed anywhere in the identity hub: the credential signing input and
//! the content-store address are both computed over it.
//!
//! ## Invariant
//!
//! The inner `Vec<u8>` is private. The only constructors serialize with
//! `serde_jcs`, so the output is RFC 8785: sorted keys, compact separators,
//! and numbers in the ECMAScript shortest round-trip form.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// # Invariants
///
/// - Object keys are sorted and separators are compact (RFC 8785).
/// - Non-integer numbers use the RFC 8785 number format.
/// - The byte sequence is valid UTF-8 JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::SerializationFailed`] if the value
    /// cannot be serialized to JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let s = serde_jcs::to_string(obj)?;
        Ok(Self(s.into_bytes()))
    }

    /// Construct canonical bytes from an already-built JSON value.
    ///
    /// Used when the caller has to edit the value first (for example,
    /// stripping a signature before computing the signing input).
    pub fn from_value(value: Value) -> Result<Self, CanonicalizationError> {
        Self::new(&value)
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_keys_with_compact_separators() {
        let data = serde_json::json!({"b": 2, "a": 1, "c": "hello"});
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        assert_eq!(cb.as_bytes(), br#"{"a":1,"b":2,"c":"hello"}"#);
    }

    #[test]
    fn nested_objects_are_sorted() {
        let data = serde_json::json!({
            "proof": {"type": "x", "creator": "did:example:abc"},
            "issuer": "did:example:abc"
        });
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(
            cb.as_bytes(),
            br#"{"issuer":"did:example:abc","proof":{"creator":"did:example:abc","type":"x"}}"#
        );
    }

    #[test]
    fn fractional_numbers_use_shortest_form() {
        let data = serde_json::json!({"a": {"b": [{"c": 3.25}]}, "score": 1.5, "whole": 2.0});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(
            cb.as_bytes(),
            br#"{"a":{"b":[{"c":3.25}]},"score":1.5,"whole":2}"#
        );
    }

    #[test]
    fn fractional_output_is_stable_across_reparse() {
        let data = serde_json::json!({"score": 0.1, "tiny": 1e-7, "n": -12.75});
        let first = CanonicalBytes::new(&data).unwrap();
        let reparsed: Value = serde_json::from_slice(first.as_bytes()).unwrap();
        let second = CanonicalBytes::new(&reparsed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn integers_and_negatives_pass() {
        let data = serde_json::json!({"w": 64, "delta": -3, "big": 9_999_999_999i64});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"big":9999999999,"delta":-3,"w":64}"#);
    }

    #[test]
    fn from_value_matches_new() {
        let data = serde_json::json!({"z": null, "a": [true, false]});
        let a = CanonicalBytes::new(&data).unwrap();
        let b = CanonicalBytes::from_value(data).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert_eq!(a.len(), a.as_bytes().len());
    }

    #[test]
    fn unicode_is_emitted_as_utf8() {
        let data = serde_json::json!({"name": "\u{00e9}t\u{00e9}"});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert!(std::str::from_utf8(cb.as_bytes()).unwrap().contains('\u{00e9}'));
    }
}
