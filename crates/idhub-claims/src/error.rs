//! Error type for the claims service.

use thiserror::Error;

use idhub_core::Did;
use idhub_crypto::{CryptoError, StorageError, TreeError};
use idhub_vc::{CredentialStoreError, ResolverError, VcError};

use crate::codec::CodecError;
use crate::verifier::VerifyError;

/// Errors from claims service operations.
#[derive(Error, Debug)]
pub enum ClaimsError {
    /// Namespace I/O failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The exact leaf is already in the tree.
    #[error("duplicate leaf {0}")]
    DuplicateLeaf(String),

    /// The leaf's index is occupied by another value.
    #[error("index already exists {0}")]
    IndexAlreadyExists(String),

    /// Any other tree failure.
    #[error("tree error: {0}")]
    Tree(TreeError),

    /// The proof is missing, its creator is not a DID, or its signature
    /// cannot be parsed.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The proof uses an unsupported suite.
    #[error("unsupported proof type {0:?}")]
    UnsupportedProofType(String),

    /// The signer's document key has an unsupported type.
    #[error("unsupported key type {0:?}")]
    UnsupportedKeyType(String),

    /// The signer's document key cannot be decoded.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// The signer's key is not in its claim tree.
    #[error("key for {0} is not authorized in its claim tree")]
    KeyNotAuthorized(Did),

    /// The signature does not recover to the signer's key.
    #[error("credential signature does not verify for {0}")]
    VerificationFailed(Did),

    /// The content store returned a hash longer than 32 bytes.
    #[error("content hash is {0} bytes, expected at most 32")]
    HashSizeError(usize),

    /// A leaf has a claim type the codec does not know.
    #[error("unknown claim type {0}")]
    UnknownClaimType(u64),

    /// A leaf has a known type but cannot be decoded.
    #[error("malformed claim: {0}")]
    MalformedClaim(String),

    /// Every version number of a claim family is taken.
    #[error("claim version space exhausted")]
    VersionExhausted,

    /// A signing key supplied to the service is malformed.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] CryptoError),

    /// The signer's DID has no resolvable key.
    #[error("no verification key found for {0}")]
    KeyNotFound(Did),

    /// Resolving a DID document failed.
    #[error("resolver error: {0}")]
    Resolver(ResolverError),

    /// The content store failed.
    #[error(transparent)]
    CredentialStore(#[from] CredentialStoreError),

    /// A registered credential could not be loaded.
    #[error("failed to load credential {hash}: {source}")]
    CredentialLookup {
        /// Hash of the registered document.
        hash: String,
        /// Why the lookup failed.
        #[source]
        source: CredentialStoreError,
    },

    /// The credential could not be canonicalized.
    #[error(transparent)]
    Credential(#[from] VcError),
}

impl From<TreeError> for ClaimsError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::DuplicateLeaf(h) => ClaimsError::DuplicateLeaf(h),
            TreeError::IndexAlreadyExists(h) => ClaimsError::IndexAlreadyExists(h),
            TreeError::Storage(s) => ClaimsError::Storage(s),
            other => ClaimsError::Tree(other),
        }
    }
}

impl From<ResolverError> for ClaimsError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::KeyNotFound(did) => ClaimsError::KeyNotFound(did),
            other => ClaimsError::Resolver(other),
        }
    }
}

impl From<VerifyError> for ClaimsError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::InvalidProof(m) => ClaimsError::InvalidProof(m),
            VerifyError::UnsupportedProofType(t) => ClaimsError::UnsupportedProofType(t),
            VerifyError::UnsupportedKeyType(t) => ClaimsError::UnsupportedKeyType(t),
            VerifyError::InvalidKeyEncoding(m) => ClaimsError::InvalidKeyEncoding(m),
            VerifyError::KeyNotAuthorized(did) => ClaimsError::KeyNotAuthorized(did),
            VerifyError::Resolver(r) => r.into(),
            VerifyError::Tree(t) => t.into(),
            VerifyError::Credential(c) => ClaimsError::Credential(c),
        }
    }
}

impl From<CodecError> for ClaimsError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::UnknownClaimType(t) => ClaimsError::UnknownClaimType(t),
            CodecError::InvalidKey(k) => ClaimsError::MalformedClaim(k.to_string()),
            CodecError::Malformed(m) => ClaimsError::MalformedClaim(m),
        }
    }
}
