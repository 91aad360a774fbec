//! # DID Documents and Resolution
//!
//! The subset of a DID document the hub reads: public keys, controller and
//! authentication references. [`DidResolver::get_verification_key`] returns
//! the key a signer *declares*; whether that key is trusted is decided by
//! the signer's claim tree, not by the document.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use idhub_core::{Did, Timestamp};
use idhub_crypto::Secp256k1PublicKey;

use crate::proof::SECP256K1_VERIFICATION_KEY_2019;

/// Default JSON-LD context for DID documents.
pub const DID_CONTEXT_V1: &str = "https://www.w3.org/2019/did/v1";

/// Errors from document validation, storage and resolution.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// The DID has no document, or the document has no public key.
    #[error("no verification key found for {0}")]
    KeyNotFound(Did),

    /// The document or one of its keys is malformed.
    #[error("invalid DID document: {0}")]
    InvalidDocument(String),

    /// Document store I/O failure.
    #[error("document store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document could not be parsed.
    #[error("document JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A public key entry in a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocPublicKey {
    /// DID URL of the key, e.g. `did:ethuri:123#keys-1`.
    pub id: String,

    /// Key suite type.
    #[serde(rename = "type")]
    pub key_type: String,

    /// DID that controls the key.
    pub controller: Did,

    /// SEC1 hex encoding of the key.
    #[serde(
        rename = "publicKeyHex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_key_hex: Option<String>,
}

impl DocPublicKey {
    /// A secp256k1 key entry `did#keys-{n}` controlled by `did`, using the
    /// uncompressed SEC1 encoding.
    pub fn secp256k1(did: &Did, n: usize, key: &Secp256k1PublicKey) -> Self {
        Self {
            id: format!("{did}#keys-{n}"),
            key_type: SECP256K1_VERIFICATION_KEY_2019.to_string(),
            controller: did.clone(),
            public_key_hex: Some(key.to_uncompressed_hex()),
        }
    }
}

/// Check that a key entry is a usable secp256k1 verification key.
///
/// The type must be `EcdsaSecp256k1VerificationKey2019`, `publicKeyHex`
/// must decode to a curve point, and `id` must be a DID URL.
pub fn validate_public_key(pk: &DocPublicKey) -> Result<(), ResolverError> {
    if pk.key_type != SECP256K1_VERIFICATION_KEY_2019 {
        return Err(ResolverError::InvalidDocument(format!(
            "unsupported key type {:?}",
            pk.key_type
        )));
    }
    let hex = pk
        .public_key_hex
        .as_deref()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ResolverError::InvalidDocument("publicKeyHex is required".into()))?;
    Secp256k1PublicKey::from_hex(hex)
        .map_err(|e| ResolverError::InvalidDocument(format!("publicKeyHex: {e}")))?;
    Did::from_did_url(&pk.id)
        .map_err(|e| ResolverError::InvalidDocument(format!("key id: {e}")))?;
    Ok(())
}

/// A DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// JSON-LD context.
    #[serde(rename = "@context")]
    pub context: String,

    /// The subject DID.
    pub id: Did,

    /// Controlling DID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<Did>,

    /// Declared public keys.
    #[serde(rename = "publicKey", default)]
    pub public_keys: Vec<DocPublicKey>,

    /// Key ids usable for authentication.
    #[serde(rename = "authentication", default, skip_serializing_if = "Vec::is_empty")]
    pub authentications: Vec<String>,

    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,

    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
}

impl Document {
    /// A fresh document for `did` with `first_key` as its only key, also
    /// referenced from `authentication`.
    pub fn new_with_key(did: &Did, first_key: DocPublicKey) -> Result<Self, ResolverError> {
        validate_public_key(&first_key)?;
        let now = Timestamp::now();
        Ok(Self {
            context: DID_CONTEXT_V1.to_string(),
            id: did.clone(),
            controller: Some(did.clone()),
            authentications: vec![first_key.id.clone()],
            public_keys: vec![first_key],
            created: Some(now),
            updated: Some(now),
        })
    }
}

/// Resolves a DID to the verification key its document declares.
pub trait DidResolver: Send + Sync {
    /// The first public key of the DID's document.
    fn get_verification_key(&self, did: &Did) -> Result<DocPublicKey, ResolverError>;
}

/// Persistence for DID documents.
pub trait DocumentStore: Send + Sync {
    /// Save (or replace) a document under its `id`.
    fn save_document(&self, doc: &Document) -> Result<(), ResolverError>;

    /// Load a document, or `None` if the DID is unknown.
    fn get_document(&self, did: &Did) -> Result<Option<Document>, ResolverError>;
}

impl<S: DocumentStore + ?Sized> DidResolver for S {
    fn get_verification_key(&self, did: &Did) -> Result<DocPublicKey, ResolverError> {
        self.get_document(did)?
            .and_then(|doc| doc.public_keys.into_iter().next())
            .ok_or_else(|| ResolverError::KeyNotFound(did.clone()))
    }
}

/// Documents held in memory. Used by tests.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<Did, Document>>,
}

impl InMemoryDocumentStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn save_document(&self, doc: &Document) -> Result<(), ResolverError> {
        self.docs.write().insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    fn get_document(&self, did: &Did) -> Result<Option<Document>, ResolverError> {
        Ok(self.docs.read().get(did).cloned())
    }
}

/// Documents stored as `{dir}/{identity-key-hex}.json`.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    dir: PathBuf,
}

impl FsDocumentStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ResolverError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, did: &Did) -> PathBuf {
        self.dir.join(format!("{}.json", did.binary().to_hex()))
    }
}

impl DocumentStore for FsDocumentStore {
    fn save_document(&self, doc: &Document) -> Result<(), ResolverError> {
        let path = self.path_for(&doc.id);
        let tmp = path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&serde_json::to_vec_pretty(doc)?)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        tracing::debug!(did = %doc.id, path = %path.display(), "saved DID document");
        Ok(())
    }

    fn get_document(&self, did: &Did) -> Result<Option<Document>, ResolverError> {
        match fs::read(self.path_for(did)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
