//! # Credential Verification
//!
//! Decides whether a content credential was signed by a key its signer has
//! authorized on-tree.
//!
//! ## Pipeline
//!
//! 1. The proof must use `EcdsaSecp256k1Signature2019`.
//! 2. The signer's DID document must declare an
//!    `EcdsaSecp256k1VerificationKey2019` key.
//! 3. The key's hex must decode to a secp256k1 point.
//! 4. That key must be a [`KeyAuthorization`] leaf in the signer's tree,
//!    checked with a verified inclusion proof. A key the document lists but
//!    the tree does not is rejected.
//! 5. The public key is recovered from the signature over Keccak-256 of
//!    the credential's signing input (canonical form without `proofValue`).
//! 6. The recovered key, encoded the way the document encodes it, must equal
//!    the document key byte for byte.
//!
//! Steps 1 through 4 fail with a typed [`VerifyError`]. A signature that
//! parses but does not recover, or recovers to another key, yields
//! `Ok(false)`.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use thiserror::Error;

use idhub_core::Did;
use idhub_crypto::secp256k1::recover;
use idhub_crypto::{MerkleTree, RecoverableSignature, Secp256k1PublicKey, TreeError};
use idhub_vc::{
    ContentCredential, DidResolver, ResolverError, VcError, SECP256K1_VERIFICATION_KEY_2019,
};

use crate::codec::{Claim, KeyAuthorization};

/// Reasons a credential cannot be checked.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The proof block is missing or its signature cannot be parsed.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The proof uses a suite other than `EcdsaSecp256k1Signature2019`.
    #[error("unsupported proof type {0:?}")]
    UnsupportedProofType(String),

    /// The signer's document key is not a secp256k1 verification key.
    #[error("unsupported key type {0:?}")]
    UnsupportedKeyType(String),

    /// The document key is not valid hex or not a curve point.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// The document key is not registered in the signer's tree.
    #[error("key for {0} is not authorized in its claim tree")]
    KeyNotAuthorized(Did),

    /// Resolving the signer's document failed.
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// Reading the signer's tree failed.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// The signing input could not be built.
    #[error(transparent)]
    Credential(#[from] VcError),
}

/// Verifies content credentials against signer claim trees.
#[derive(Clone)]
pub struct CredentialVerifier {
    resolver: Arc<dyn DidResolver>,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    /// A verifier that reads declared keys from `resolver`.
    pub fn new(resolver: Arc<dyn DidResolver>) -> Self {
        Self { resolver }
    }

    /// Check `credential` against `signer`'s claim tree.
    pub fn verify(
        &self,
        credential: &ContentCredential,
        signer_tree: &MerkleTree,
        signer: &Did,
    ) -> Result<bool, VerifyError> {
        let proof = credential
            .proof
            .as_ref()
            .ok_or_else(|| VerifyError::InvalidProof("credential has no proof".into()))?;
        if !proof.is_secp256k1() {
            return Err(VerifyError::UnsupportedProofType(proof.proof_type.clone()));
        }

        let doc_key = self.resolver.get_verification_key(signer)?;
        if doc_key.key_type != SECP256K1_VERIFICATION_KEY_2019 {
            return Err(VerifyError::UnsupportedKeyType(doc_key.key_type));
        }
        let key_hex = doc_key.public_key_hex.as_deref().unwrap_or_default();
        let key_bytes = hex::decode(key_hex.trim().trim_start_matches("0x"))
            .map_err(|e| VerifyError::InvalidKeyEncoding(e.to_string()))?;
        let public_key = Secp256k1PublicKey::from_sec1_bytes(&key_bytes)
            .map_err(|e| VerifyError::InvalidKeyEncoding(e.to_string()))?;

        let authorization = Claim::KeyAuthorization(KeyAuthorization { public_key }).entry();
        if !signer_tree.entry_exists(&authorization)? {
            return Err(VerifyError::KeyNotAuthorized(signer.clone()));
        }

        let signature = RecoverableSignature::from_hex(&proof.proof_value)
            .map_err(|e| VerifyError::InvalidProof(e.to_string()))?;
        let input = credential.signing_input()?;
        let recovered = match recover(&input, &signature) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(did = %signer, error = %e, "signature recovery failed");
                return Ok(false);
            }
        };

        let recovered_bytes = recovered.to_sec1_bytes(key_bytes.len() == 33);
        let matches: bool = recovered_bytes.as_slice().ct_eq(key_bytes.as_slice()).into();
        tracing::debug!(did = %signer, verified = matches, "credential signature checked");
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idhub_crypto::{MemoryStorage, Secp256k1KeyPair, Storage, DEFAULT_MAX_LEVELS};
    use idhub_vc::{DocPublicKey, Document, DocumentStore, InMemoryDocumentStore};
    use serde_json::json;

    struct Fixture {
        did: Did,
        key: Secp256k1KeyPair,
        docs: Arc<InMemoryDocumentStore>,
        tree: MerkleTree,
    }

    fn fixture() -> Fixture {
        let did = Did::new("did:example:abc").unwrap();
        let key = Secp256k1KeyPair::generate();
        let docs = Arc::new(InMemoryDocumentStore::new());
        let doc =
            Document::new_with_key(&did, DocPublicKey::secp256k1(&did, 1, &key.public_key()))
                .unwrap();
        docs.save_document(&doc).unwrap();
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut tree = MerkleTree::open(storage, DEFAULT_MAX_LEVELS).unwrap();
        tree.add(
            &Claim::KeyAuthorization(KeyAuthorization {
                public_key: key.public_key(),
            })
            .entry(),
        )
        .unwrap();
        Fixture {
            did,
            key,
            docs,
            tree,
        }
    }

    fn signed(f: &Fixture) -> ContentCredential {
        let mut cred = ContentCredential::new(&f.did, json!({"id": "doc1"}));
        cred.sign_secp256k1(&f.key, &f.did, None).unwrap();
        cred
    }

    #[test]
    fn accepts_authorized_signature() {
        let f = fixture();
        let verifier = CredentialVerifier::new(f.docs.clone());
        assert!(verifier.verify(&signed(&f), &f.tree, &f.did).unwrap());
    }

    #[test]
    fn compressed_document_key_is_accepted() {
        let f = fixture();
        let mut doc = f.docs.get_document(&f.did).unwrap().unwrap();
        doc.public_keys[0].public_key_hex = Some(f.key.public_key().to_hex());
        f.docs.save_document(&doc).unwrap();
        let verifier = CredentialVerifier::new(f.docs.clone());
        assert!(verifier.verify(&signed(&f), &f.tree, &f.did).unwrap());
    }

    #[test]
    fn tampered_subject_does_not_verify() {
        let f = fixture();
        let mut cred = signed(&f);
        cred.credential_subject = json!({"id": "doc2"});
        let verifier = CredentialVerifier::new(f.docs.clone());
        assert!(!verifier.verify(&cred, &f.tree, &f.did).unwrap());
    }

    #[test]
    fn unregistered_key_is_not_authorized() {
        let f = fixture();
        let rogue = Secp256k1KeyPair::generate();
        let doc = Document::new_with_key(
            &f.did,
            DocPublicKey::secp256k1(&f.did, 1, &rogue.public_key()),
        )
        .unwrap();
        f.docs.save_document(&doc).unwrap();
        let mut cred = ContentCredential::new(&f.did, json!({"id": "doc1"}));
        cred.sign_secp256k1(&rogue, &f.did, None).unwrap();
        let verifier = CredentialVerifier::new(f.docs.clone());
        assert!(matches!(
            verifier.verify(&cred, &f.tree, &f.did),
            Err(VerifyError::KeyNotAuthorized(_))
        ));
    }

    #[test]
    fn rejects_other_proof_suites() {
        let f = fixture();
        let mut cred = signed(&f);
        cred.proof.as_mut().unwrap().proof_type = "Ed25519Signature2018".into();
        let verifier = CredentialVerifier::new(f.docs.clone());
        assert!(matches!(
            verifier.verify(&cred, &f.tree, &f.did),
            Err(VerifyError::UnsupportedProofType(_))
        ));
    }

    #[test]
    fn malformed_signature_is_invalid_proof() {
        let f = fixture();
        let mut cred = signed(&f);
        cred.proof.as_mut().unwrap().proof_value = "zz".into();
        let verifier = CredentialVerifier::new(f.docs.clone());
        assert!(matches!(
            verifier.verify(&cred, &f.tree, &f.did),
            Err(VerifyError::InvalidProof(_))
        ));
    }

    #[test]
    fn missing_proof_is_invalid_proof() {
        let f = fixture();
        let cred = ContentCredential::new(&f.did, json!({"id": "doc1"}));
        let verifier = CredentialVerifier::new(f.docs.clone());
        assert!(matches!(
            verifier.verify(&cred, &f.tree, &f.did),
            Err(VerifyError::InvalidProof(_))
        ));
    }
}
