//! # Content Credentials
//!
//! A [`ContentCredential`] asserts that its issuer published a piece of
//! content. It carries one secp256k1 [`LinkedDataProof`].
//!
//! ## Security Invariants
//!
//! - **Signing** canonicalizes the credential with `proof.proofValue`
//!   removed via [`CanonicalBytes::from_value()`], hashes with Keccak-256
//!   and attaches a recoverable signature. A signature cannot cover itself;
//!   every other proof field (type, creator, created, nonce, domain) is
//!   signed.
//! - **Content addressing** canonicalizes the full credential, proof
//!   included. Stores use this hash as the credential's address and the
//!   claims tree records it.
//! - `credential_subject` is intentionally open JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use idhub_core::{keccak256_digest, CanonicalBytes, ContentDigest, Did, Timestamp};
use idhub_crypto::{CryptoError, Secp256k1KeyPair};

use crate::proof::LinkedDataProof;

/// W3C credentials context.
pub const CREDENTIALS_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";
/// Content credential context.
pub const CONTENT_CREDENTIAL_CONTEXT_V1: &str =
    "https://id.civil.co/credentials/contentcredential/v1";
/// The generic VC type.
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";
/// The content credential type.
pub const CONTENT_CREDENTIAL_TYPE: &str = "ContentCredential";
/// Schema for content credential subjects.
pub const CONTENT_METADATA_SCHEMA_ID: &str =
    "https://id.civil.co/credentials/schemas/v1/metadata.json";

/// Errors from credential signing and hashing.
#[derive(Error, Debug)]
pub enum VcError {
    /// Canonicalization of the credential failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] idhub_core::CanonicalizationError),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Crypto(#[from] CryptoError),

    /// The credential has no proof block.
    #[error("credential has no proof")]
    MissingProof,
}

/// Reference to the schema a credential subject follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSchema {
    /// Schema URI.
    pub id: String,
    /// Validator type.
    #[serde(rename = "type")]
    pub schema_type: String,
}

impl Default for CredentialSchema {
    fn default() -> Self {
        Self {
            id: CONTENT_METADATA_SCHEMA_ID.to_string(),
            schema_type: "JsonSchemaValidator2018".to_string(),
        }
    }
}

/// A verifiable credential registering a piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCredential {
    /// JSON-LD context URIs.
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    /// Credential types.
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,

    /// DID of the issuer.
    pub issuer: String,

    /// When the credential was issued.
    #[serde(rename = "issuanceDate")]
    pub issuance_date: Timestamp,

    /// What the credential is about.
    #[serde(rename = "credentialSubject")]
    pub credential_subject: Value,

    /// Schema of the subject.
    #[serde(
        rename = "credentialSchema",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub credential_schema: Option<CredentialSchema>,

    /// The signer's proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<LinkedDataProof>,
}

impl ContentCredential {
    /// An unsigned content credential issued by `issuer` now.
    pub fn new(issuer: &Did, subject: Value) -> Self {
        Self {
            context: vec![
                CREDENTIALS_CONTEXT_V1.to_string(),
                CONTENT_CREDENTIAL_CONTEXT_V1.to_string(),
            ],
            credential_type: vec![
                VERIFIABLE_CREDENTIAL_TYPE.to_string(),
                CONTENT_CREDENTIAL_TYPE.to_string(),
            ],
            issuer: issuer.to_string(),
            issuance_date: Timestamp::now(),
            credential_subject: subject,
            credential_schema: Some(CredentialSchema::default()),
            proof: None,
        }
    }

    /// The bytes a signer signs: the full credential without
    /// `proof.proofValue`, JCS-canonicalized.
    pub fn signing_input(&self) -> Result<CanonicalBytes, VcError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(proof) = value.get_mut("proof").and_then(Value::as_object_mut) {
            proof.remove("proofValue");
        }
        Ok(CanonicalBytes::from_value(value)?)
    }

    /// Keccak-256 of the full canonical credential, proof included.
    pub fn content_hash(&self) -> Result<ContentDigest, VcError> {
        let canonical = CanonicalBytes::new(self)?;
        Ok(keccak256_digest(&canonical))
    }

    /// Attach an `EcdsaSecp256k1Signature2019` proof signed by `keypair`.
    ///
    /// Replaces any existing proof.
    pub fn sign_secp256k1(
        &mut self,
        keypair: &Secp256k1KeyPair,
        creator: &Did,
        created: Option<Timestamp>,
    ) -> Result<(), VcError> {
        self.proof = Some(LinkedDataProof::new_secp256k1(creator, created));
        let input = self.signing_input()?;
        let signature = keypair.sign(&input)?;
        let proof = self.proof.as_mut().ok_or(VcError::MissingProof)?;
        proof.proof_value = signature.to_hex();
        Ok(())
    }

    /// The proof block, or [`VcError::MissingProof`].
    pub fn proof(&self) -> Result<&LinkedDataProof, VcError> {
        self.proof.as_ref().ok_or(VcError::MissingProof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idhub_crypto::secp256k1::recover;
    use idhub_crypto::RecoverableSignature;
    use serde_json::json;

    fn signed() -> (ContentCredential, Secp256k1KeyPair) {
        let did = Did::new("did:example:abc").unwrap();
        let kp = Secp256k1KeyPair::generate();
        let mut cred = ContentCredential::new(&did, json!({"id": "doc1"}));
        cred.sign_secp256k1(&kp, &did, None).unwrap();
        (cred, kp)
    }

    #[test]
    fn signature_recovers_to_signer() {
        let (cred, kp) = signed();
        let proof = cred.proof().unwrap();
        let sig = RecoverableSignature::from_hex(&proof.proof_value).unwrap();
        let recovered = recover(&cred.signing_input().unwrap(), &sig).unwrap();
        assert_eq!(recovered, kp.public_key());
    }

    #[test]
    fn signing_input_excludes_proof_value_only() {
        let (cred, _) = signed();
        let input = String::from_utf8(cred.signing_input().unwrap().as_bytes().to_vec()).unwrap();
        assert!(!input.contains("proofValue"));
        assert!(input.contains("EcdsaSecp256k1Signature2019"));
        assert!(input.contains("\"creator\":\"did:example:abc\""));
    }

    #[test]
    fn signing_input_ignores_signature_changes() {
        let (cred, _) = signed();
        let mut other = cred.clone();
        other.proof.as_mut().unwrap().proof_value = "00".repeat(65);
        assert_eq!(cred.signing_input().unwrap(), other.signing_input().unwrap());
        assert_ne!(cred.content_hash().unwrap(), other.content_hash().unwrap());
    }

    #[test]
    fn content_hash_covers_subject() {
        let (cred, _) = signed();
        let mut tampered = cred.clone();
        tampered.credential_subject = json!({"id": "doc2"});
        assert_ne!(cred.content_hash().unwrap(), tampered.content_hash().unwrap());
    }

    #[test]
    fn serde_uses_w3c_field_names() {
        let (cred, _) = signed();
        let value = serde_json::to_value(&cred).unwrap();
        for field in ["@context", "type", "issuer", "issuanceDate", "credentialSubject", "proof"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        let back: ContentCredential = serde_json::from_value(value).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn unsigned_credential_reports_missing_proof() {
        let did = Did::new("did:example:abc").unwrap();
        let cred = ContentCredential::new(&did, json!({}));
        assert!(matches!(cred.proof(), Err(VcError::MissingProof)));
        assert!(cred.signing_input().is_ok());
    }
}
