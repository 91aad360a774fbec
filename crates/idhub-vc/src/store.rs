//! # Content-Addressed Credential Stores
//!
//! A credential is addressed by the Keccak-256 of its full canonical form,
//! proof included. [`CredentialStore::add_credential`] computes that hash
//! itself; callers never supply it.
//!
//! Lookups accept the 64-character hex hash (optionally `0x`-prefixed) or
//! its Keccak-256 multihash form (`1b20` + 64 hex characters).
//!
//! ## Integrity Invariant
//!
//! [`ContentAddressedStore`] writes the canonical bytes to
//! `{base_dir}/{hash}.json`. On read the hash is recomputed from the file
//! contents and compared against the requested hash, so corruption or
//! substitution on disk is detected.
//!
//! Files are written under a temporary name and renamed into place. A
//! resubmitted credential whose file is missing or damaged is rewritten,
//! so retrying `add_credential` always leaves a loadable file behind.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;

use idhub_core::{keccak256_digest, CanonicalBytes, ContentDigest, DigestAlgorithm};

use crate::credential::{ContentCredential, VcError};

/// Errors from credential store operations.
#[derive(Error, Debug)]
pub enum CredentialStoreError {
    /// The lookup key is not a Keccak-256 hash or multihash.
    #[error("invalid credential hash {0:?}")]
    InvalidHash(String),

    /// No credential is stored under the hash.
    #[error("credential {0} not found")]
    NotFound(String),

    /// Stored bytes do not hash to their address.
    #[error("integrity check failed for {expected}: content hashes to {actual}")]
    Integrity {
        /// The address that was requested.
        expected: String,
        /// The hash of what was found there.
        actual: String,
    },

    /// The credential could not be canonicalized.
    #[error(transparent)]
    Credential(#[from] VcError),

    /// A stored credential could not be parsed.
    #[error("stored credential JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("credential store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a lookup key: 64 hex characters (optional `0x`) or the Keccak-256
/// multihash form `1b20<64 hex>`.
pub fn parse_content_hash(s: &str) -> Result<ContentDigest, CredentialStoreError> {
    let trimmed = s.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let parsed = match trimmed.len() {
        68 => ContentDigest::from_multihash_hex(DigestAlgorithm::Keccak256, trimmed),
        _ => ContentDigest::from_hex(DigestAlgorithm::Keccak256, trimmed),
    };
    parsed.map_err(|_| CredentialStoreError::InvalidHash(s.to_string()))
}

/// Content-addressed persistence for credentials.
pub trait CredentialStore: Send + Sync {
    /// Persist a credential, returning its content hash as 64 hex chars.
    /// Storing the same credential twice is a no-op.
    fn add_credential(&self, credential: &ContentCredential)
        -> Result<String, CredentialStoreError>;

    /// Load the credential stored under `hash`.
    fn get_credential_by_hash(&self, hash: &str)
        -> Result<ContentCredential, CredentialStoreError>;

    /// Load several credentials. The result has one entry per requested
    /// hash, in order.
    fn get_credentials_by_hashes(
        &self,
        hashes: &[String],
    ) -> Vec<Result<ContentCredential, CredentialStoreError>> {
        hashes
            .iter()
            .map(|h| self.get_credential_by_hash(h))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// MemoryCredentialStore
// ---------------------------------------------------------------------------

/// Credentials held in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    creds: RwLock<HashMap<[u8; 32], ContentCredential>>,
}

impl MemoryCredentialStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.creds.read().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.creds.read().is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn add_credential(
        &self,
        credential: &ContentCredential,
    ) -> Result<String, CredentialStoreError> {
        let digest = credential.content_hash()?;
        self.creds
            .write()
            .entry(digest.bytes)
            .or_insert_with(|| credential.clone());
        Ok(digest.to_hex())
    }

    fn get_credential_by_hash(
        &self,
        hash: &str,
    ) -> Result<ContentCredential, CredentialStoreError> {
        let digest = parse_content_hash(hash)?;
        self.creds
            .read()
            .get(&digest.bytes)
            .cloned()
            .ok_or_else(|| CredentialStoreError::NotFound(digest.to_hex()))
    }

    fn get_credentials_by_hashes(
        &self,
        hashes: &[String],
    ) -> Vec<Result<ContentCredential, CredentialStoreError>> {
        let creds = self.creds.read();
        hashes
            .iter()
            .map(|h| {
                let digest = parse_content_hash(h)?;
                creds
                    .get(&digest.bytes)
                    .cloned()
                    .ok_or_else(|| CredentialStoreError::NotFound(digest.to_hex()))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ContentAddressedStore
// ---------------------------------------------------------------------------

/// Credentials stored as canonical JSON at `{base_dir}/{hash}.json`.
#[derive(Debug, Clone)]
pub struct ContentAddressedStore {
    base_dir: PathBuf,
}

impl ContentAddressedStore {
    /// Open (creating if needed) a store rooted at `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, CredentialStoreError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// The backing directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, digest: &ContentDigest) -> PathBuf {
        self.base_dir.join(format!("{}.json", digest.to_hex()))
    }
}

impl CredentialStore for ContentAddressedStore {
    fn add_credential(
        &self,
        credential: &ContentCredential,
    ) -> Result<String, CredentialStoreError> {
        let canonical = CanonicalBytes::new(credential).map_err(VcError::from)?;
        let digest = keccak256_digest(&canonical);
        let path = self.path_for(&digest);
        match fs::read(&path) {
            Ok(existing) if existing == canonical.as_bytes() => {
                tracing::debug!(hash = %digest.to_hex(), "credential already stored");
                return Ok(digest.to_hex());
            }
            Ok(_) => {
                tracing::warn!(hash = %digest.to_hex(), "replacing corrupt credential file");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        // Readers only ever see a complete file: write aside, then rename.
        let tmp = self
            .base_dir
            .join(format!("{}.{}.tmp", digest.to_hex(), uuid::Uuid::new_v4()));
        let written = (|| -> std::io::Result<()> {
            use std::io::Write;
            let mut f = fs::File::create(&tmp)?;
            f.write_all(canonical.as_bytes())?;
            f.sync_all()?;
            fs::rename(&tmp, &path)
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        tracing::debug!(hash = %digest.to_hex(), "stored credential");
        Ok(digest.to_hex())
    }

    fn get_credential_by_hash(
        &self,
        hash: &str,
    ) -> Result<ContentCredential, CredentialStoreError> {
        let digest = parse_content_hash(hash)?;
        let bytes = match fs::read(self.path_for(&digest)) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialStoreError::NotFound(digest.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };
        let credential: ContentCredential = serde_json::from_slice(&bytes)?;
        let actual = credential.content_hash()?;
        if actual != digest {
            return Err(CredentialStoreError::Integrity {
                expected: digest.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idhub_core::Did;
    use idhub_crypto::Secp256k1KeyPair;
    use serde_json::json;

    fn credential(subject: &str) -> ContentCredential {
        let did = Did::new("did:example:abc").unwrap();
        let kp = Secp256k1KeyPair::generate();
        let mut cred = ContentCredential::new(&did, json!({"id": subject}));
        cred.sign_secp256k1(&kp, &did, None).unwrap();
        cred
    }

    fn exercise(store: &dyn CredentialStore) {
        let cred = credential("doc1");
        let hash = store.add_credential(&cred).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, cred.content_hash().unwrap().to_hex());
        assert_eq!(store.add_credential(&cred).unwrap(), hash);

        assert_eq!(store.get_credential_by_hash(&hash).unwrap(), cred);
        assert_eq!(
            store.get_credential_by_hash(&format!("0x{hash}")).unwrap(),
            cred
        );
        assert_eq!(
            store.get_credential_by_hash(&format!("1b20{hash}")).unwrap(),
            cred
        );

        let missing = "ab".repeat(32);
        assert!(matches!(
            store.get_credential_by_hash(&missing),
            Err(CredentialStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_credential_by_hash("not-a-hash"),
            Err(CredentialStoreError::InvalidHash(_))
        ));

        let results = store.get_credentials_by_hashes(&[hash.clone(), missing]);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn memory_store_contract() {
        let store = MemoryCredentialStore::new();
        exercise(&store);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn fs_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&ContentAddressedStore::open(dir.path()).unwrap());
    }

    #[test]
    fn fs_store_detects_substituted_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentAddressedStore::open(dir.path()).unwrap();
        let a = credential("doc1");
        let b = credential("doc2");
        let hash_a = store.add_credential(&a).unwrap();
        let hash_b = store.add_credential(&b).unwrap();
        fs::copy(
            dir.path().join(format!("{hash_b}.json")),
            dir.path().join(format!("{hash_a}.json")),
        )
        .unwrap();
        assert!(matches!(
            store.get_credential_by_hash(&hash_a),
            Err(CredentialStoreError::Integrity { .. })
        ));
    }

    #[test]
    fn fs_store_repairs_truncated_file_on_resubmit() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentAddressedStore::open(dir.path()).unwrap();
        let cred = credential("doc1");
        let hash = cred.content_hash().unwrap().to_hex();
        let path = dir.path().join(format!("{hash}.json"));
        fs::write(&path, br#"{"@cont"#).unwrap();
        assert!(store.get_credential_by_hash(&hash).is_err());

        assert_eq!(store.add_credential(&cred).unwrap(), hash);
        assert_eq!(store.get_credential_by_hash(&hash).unwrap(), cred);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn fs_store_keeps_intact_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentAddressedStore::open(dir.path()).unwrap();
        let cred = credential("doc1");
        let hash = store.add_credential(&cred).unwrap();
        let path = dir.path().join(format!("{hash}.json"));
        let modified = fs::metadata(&path).unwrap().modified().unwrap();
        store.add_credential(&cred).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn multihash_with_wrong_code_is_rejected() {
        let hex = "cd".repeat(32);
        assert!(parse_content_hash(&format!("1220{hex}")).is_err());
        assert_eq!(
            parse_content_hash(&format!("1b20{hex}")).unwrap().to_hex(),
            hex
        );
    }
}
