//! # Claims Service
//!
//! Orchestrates identity claim trees and the root commitment tree.
//!
//! ## Namespaces
//!
//! All trees share one [`Storage`]. Each identity's tree lives under
//! `0x01 || IdentityKey`; the root commitment tree lives under
//! `0x00 || Keccak256("idhub/root-commitment-tree")`. Both prefixes are 33
//! bytes, so no namespace is a prefix of another.
//!
//! ## Write Protocol
//!
//! Every mutation of an identity tree is followed by a new [`RootPointer`]
//! in the root tree, at the next free version for that identity.
//!
//! - Identity writes hold that identity's lock from tree load through the
//!   root commit, so the version scan and the insert it guards are atomic.
//! - The root tree has its own mutex, held across its version scan and
//!   insert. Lock order is always identity, then root.
//!
//! Reads open fresh tree handles and take no locks. They see whatever root
//! was last written when they open the tree.
//!
//! ## Partial Failure
//!
//! [`ClaimsService::claim_content`] persists the credential before touching
//! the tree. If the tree insert fails the stored credential is an orphan;
//! resubmitting is safe because the store is content-addressed.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use idhub_core::{Did, IdentityKey};
use idhub_crypto::{keccak256, Hash, MerkleTree, Secp256k1PublicKey, Storage, DEFAULT_MAX_LEVELS};
use idhub_vc::{ContentCredential, CredentialStore, CredentialStoreError, DidResolver};

use crate::codec::{hindex_at, Claim, DocType, DocumentRegistration, KeyAuthorization, RootPointer};
use crate::error::ClaimsError;
use crate::locks::{with_identity_lock, IdentityLocks};
use crate::verifier::CredentialVerifier;

const ROOT_NAMESPACE_TAG: u8 = 0x00;
const IDENTITY_NAMESPACE_TAG: u8 = 0x01;
const ROOT_NAMESPACE_LABEL: &[u8] = b"idhub/root-commitment-tree";

/// Storage prefix of an identity's claim tree.
pub fn identity_namespace(identity: &IdentityKey) -> Vec<u8> {
    let mut ns = Vec::with_capacity(33);
    ns.push(IDENTITY_NAMESPACE_TAG);
    ns.extend_from_slice(identity.as_bytes());
    ns
}

/// Storage prefix of the root commitment tree.
pub fn root_namespace() -> Vec<u8> {
    let mut ns = Vec::with_capacity(33);
    ns.push(ROOT_NAMESPACE_TAG);
    ns.extend_from_slice(&keccak256(ROOT_NAMESPACE_LABEL));
    ns
}

/// Claims service configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsServiceConfig {
    /// Depth bound for every tree the service opens.
    pub max_tree_levels: usize,
}

impl Default for ClaimsServiceConfig {
    fn default() -> Self {
        Self {
            max_tree_levels: DEFAULT_MAX_LEVELS,
        }
    }
}

/// What [`ClaimsService::claim_content`] registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    /// Content hash of the stored credential.
    pub content_hash: Hash,
    /// Version of the document registration in the signer's tree.
    pub document_version: u32,
    /// The root pointer committed for the signer.
    pub root_pointer: RootPointer,
}

/// The claims service.
pub struct ClaimsService {
    storage: Arc<dyn Storage>,
    root_tree: Mutex<MerkleTree>,
    credentials: Arc<dyn CredentialStore>,
    verifier: CredentialVerifier,
    locks: IdentityLocks,
    config: ClaimsServiceConfig,
}

impl std::fmt::Debug for ClaimsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsService")
            .field("root", &self.root_tree.lock().root())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClaimsService {
    /// Build a service over `storage`, opening the root commitment tree.
    pub fn new(
        storage: Arc<dyn Storage>,
        credentials: Arc<dyn CredentialStore>,
        resolver: Arc<dyn DidResolver>,
        config: ClaimsServiceConfig,
    ) -> Result<Self, ClaimsError> {
        let root_tree = MerkleTree::open(
            storage.with_prefix(&root_namespace()),
            config.max_tree_levels,
        )?;
        Ok(Self {
            storage,
            root_tree: Mutex::new(root_tree),
            credentials,
            verifier: CredentialVerifier::new(resolver),
            locks: IdentityLocks::new(),
            config,
        })
    }

    /// The configuration the service was built with.
    pub fn config(&self) -> &ClaimsServiceConfig {
        &self.config
    }

    /// Current root of the root commitment tree.
    pub fn root(&self) -> Hash {
        self.root_tree.lock().root()
    }

    /// Current root of `identity`'s claim tree.
    pub fn identity_root(&self, identity: &Did) -> Result<Hash, ClaimsError> {
        Ok(self.open_identity_tree(&identity.binary())?.root())
    }

    fn open_identity_tree(&self, key: &IdentityKey) -> Result<MerkleTree, ClaimsError> {
        Ok(MerkleTree::open(
            self.storage.with_prefix(&identity_namespace(key)),
            self.config.max_tree_levels,
        )?)
    }

    fn open_root_tree(&self) -> Result<MerkleTree, ClaimsError> {
        Ok(MerkleTree::open(
            self.storage.with_prefix(&root_namespace()),
            self.config.max_tree_levels,
        )?)
    }

    /// Authorize `public_key` (SEC1 bytes) in `identity`'s tree and commit
    /// the new root.
    ///
    /// For a new identity the committed pointer has version 1. Authorizing a
    /// key that is already in the tree fails with
    /// [`ClaimsError::DuplicateLeaf`].
    pub fn create_tree_for_identity(
        &self,
        identity: &Did,
        public_key: &[u8],
    ) -> Result<RootPointer, ClaimsError> {
        let public_key = Secp256k1PublicKey::from_sec1_bytes(public_key)?;
        let key = identity.binary();
        with_identity_lock(&self.locks, &key, || -> Result<RootPointer, ClaimsError> {
            let mut tree = self.open_identity_tree(&key)?;
            let claim = Claim::KeyAuthorization(KeyAuthorization { public_key });
            tree.add(&claim.entry())?;
            tracing::debug!(did = %identity, root = %tree.root(), "authorized key");
            let pointer = self.commit_root(identity, tree.root())?;
            tracing::info!(did = %identity, version = pointer.version, "identity tree created");
            Ok(pointer)
        })
    }

    /// Verify `credential` and register it in its signer's tree.
    ///
    /// The signer is the proof's `creator`. The credential is stored in the
    /// content store and its hash registered as a
    /// [`DocumentRegistration`] at the next free version; the signer's new
    /// root is then committed.
    pub fn claim_content(
        &self,
        credential: &ContentCredential,
    ) -> Result<ClaimReceipt, ClaimsError> {
        let proof = credential
            .proof
            .as_ref()
            .ok_or_else(|| ClaimsError::InvalidProof("credential has no proof".into()))?;
        let signer = Did::from_did_url(&proof.creator)
            .map_err(|e| ClaimsError::InvalidProof(format!("creator: {e}")))?;
        let key = signer.binary();

        with_identity_lock(&self.locks, &key, || -> Result<ClaimReceipt, ClaimsError> {
            let mut tree = self.open_identity_tree(&key)?;
            if !self.verifier.verify(credential, &tree, &signer)? {
                return Err(ClaimsError::VerificationFailed(signer.clone()));
            }

            let hash_hex = self.credentials.add_credential(credential)?;
            let content_hash = content_hash_from_hex(&hash_hex)?;

            let mut registration = DocumentRegistration {
                content_hash,
                signer: key,
                doc_type: DocType::CONTENT_CREDENTIAL,
                version: 0,
            };
            registration.version =
                next_version(&tree, &Claim::DocumentRegistration(registration))?;
            tree.add(&Claim::DocumentRegistration(registration).entry())?;
            tracing::debug!(
                did = %signer,
                content_hash = %content_hash,
                version = registration.version,
                "registered document"
            );

            let root_pointer = self.commit_root(&signer, tree.root())?;
            Ok(ClaimReceipt {
                content_hash,
                document_version: registration.version,
                root_pointer,
            })
        })
    }

    /// Every decodable claim in `identity`'s tree under its current root.
    pub fn get_claims_for_identity(&self, identity: &Did) -> Result<Vec<Claim>, ClaimsError> {
        let tree = self.open_identity_tree(&identity.binary())?;
        decode_leaves(&tree, &tree.root())
    }

    /// Every decodable claim in `identity`'s tree under a historical root.
    pub fn get_claims_for_identity_at(
        &self,
        identity: &Did,
        root: &Hash,
    ) -> Result<Vec<Claim>, ClaimsError> {
        let tree = self.open_identity_tree(&identity.binary())?;
        decode_leaves(&tree, root)
    }

    /// Every decodable claim in the root commitment tree.
    pub fn get_root_claims(&self) -> Result<Vec<Claim>, ClaimsError> {
        let tree = self.open_root_tree()?;
        decode_leaves(&tree, &tree.root())
    }

    /// The full credentials behind the document registrations in `claims`,
    /// in order. Other claim kinds are ignored.
    pub fn claims_to_credentials(
        &self,
        claims: &[Claim],
    ) -> Result<Vec<ContentCredential>, ClaimsError> {
        let hashes: Vec<String> = claims
            .iter()
            .filter_map(|c| match c {
                Claim::DocumentRegistration(d) => Some(d.content_hash.to_hex()),
                _ => None,
            })
            .collect();
        self.credentials
            .get_credentials_by_hashes(&hashes)
            .into_iter()
            .zip(hashes)
            .map(|(result, hash)| {
                result.map_err(|source| ClaimsError::CredentialLookup { hash, source })
            })
            .collect()
    }

    /// The latest root pointer for `identity`, or `None` if it has never
    /// been published.
    pub fn current_root_for_identity(
        &self,
        identity: &Did,
    ) -> Result<Option<RootPointer>, ClaimsError> {
        let tree = self.open_root_tree()?;
        let root = tree.root();
        let family = Claim::RootPointer(RootPointer {
            identity: identity.binary(),
            version: 0,
            root: Hash::ZERO,
        });
        let mut latest = None;
        let mut version = 1u32;
        while let Some(entry) = tree.get_value(&hindex_at(&family, version), &root)? {
            latest = Some(entry);
            version = match version.checked_add(1) {
                Some(v) => v,
                None => break,
            };
        }
        match latest {
            None => Ok(None),
            Some(entry) => match Claim::from_entry(&entry)? {
                Claim::RootPointer(pointer) => Ok(Some(pointer)),
                other => Err(ClaimsError::MalformedClaim(format!(
                    "root pointer index holds a {:?} claim",
                    other.claim_type()
                ))),
            },
        }
    }

    fn commit_root(&self, identity: &Did, identity_root: Hash) -> Result<RootPointer, ClaimsError> {
        let mut root_tree = self.root_tree.lock();
        let mut pointer = RootPointer {
            identity: identity.binary(),
            version: 0,
            root: identity_root,
        };
        pointer.version = next_version(&root_tree, &Claim::RootPointer(pointer))?;
        root_tree.add(&Claim::RootPointer(pointer).entry())?;
        tracing::info!(
            did = %identity,
            version = pointer.version,
            root = %identity_root,
            commitment_root = %root_tree.root(),
            "committed identity root"
        );
        Ok(pointer)
    }
}

/// First version `>= 1` with no leaf in `claim`'s family under the tree's
/// current root.
fn next_version(tree: &MerkleTree, claim: &Claim) -> Result<u32, ClaimsError> {
    let root = tree.root();
    let mut version = 1u32;
    while tree.get_value(&hindex_at(claim, version), &root)?.is_some() {
        version = version
            .checked_add(1)
            .ok_or(ClaimsError::VersionExhausted)?;
    }
    Ok(version)
}

fn content_hash_from_hex(hash_hex: &str) -> Result<Hash, ClaimsError> {
    let trimmed = hash_hex.trim();
    let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|_| CredentialStoreError::InvalidHash(hash_hex.to_string()))?;
    if bytes.len() > 32 {
        return Err(ClaimsError::HashSizeError(bytes.len()));
    }
    // Short hashes occupy the leading bytes; the tail stays zero.
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(&bytes);
    Ok(Hash(out))
}

fn decode_leaves(tree: &MerkleTree, root: &Hash) -> Result<Vec<Claim>, ClaimsError> {
    let leaves = tree.dump_leaves(root)?;
    let mut claims = Vec::with_capacity(leaves.len());
    for entry in leaves {
        match Claim::from_entry(&entry) {
            Ok(claim) => claims.push(claim),
            Err(e) => {
                tracing::warn!(hindex = %entry.hindex(), error = %e, "skipping undecodable leaf");
            }
        }
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_fixed_width_and_distinct() {
        let a = identity_namespace(&Did::new("did:example:a").unwrap().binary());
        let b = identity_namespace(&Did::new("did:example:b").unwrap().binary());
        let root = root_namespace();
        assert_eq!(a.len(), 33);
        assert_eq!(root.len(), 33);
        assert_ne!(a, b);
        assert_ne!(a[0], root[0]);
    }

    #[test]
    fn short_hashes_fill_leading_bytes() {
        let h = content_hash_from_hex("0x0102").unwrap();
        assert_eq!(&h.0[..2], &[1, 2]);
        assert!(h.0[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn long_hashes_are_rejected() {
        assert!(matches!(
            content_hash_from_hex(&"ab".repeat(33)),
            Err(ClaimsError::HashSizeError(33))
        ));
        assert!(matches!(
            content_hash_from_hex("xyz"),
            Err(ClaimsError::CredentialStore(_))
        ));
    }
}
