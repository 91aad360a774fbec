//! # Claim Codec
//!
//! Converts typed [`Claim`]s to and from raw tree [`Entry`] values.
//!
//! ## Layout
//!
//! Every claim uses four 32-byte index elements and four 32-byte value
//! elements. `index[0]` is the header:
//!
//! ```text
//! byte  0..8    claim type, u64 big-endian
//! byte  8..12   version, u32 big-endian
//! byte 12..32   zero
//! ```
//!
//! | Claim                  | index[1]        | index[2]                | index[3]             | value[0] |
//! |------------------------|-----------------|-------------------------|----------------------|----------|
//! | `KeyAuthorization`     | key x-coordinate| byte 0: SEC1 prefix     | zero                 | zero     |
//! | `RootPointer`          | identity key    | zero                    | zero                 | root     |
//! | `DocumentRegistration` | content hash    | signer identity key     | bytes 28..32: doc type | zero   |
//!
//! Because the version lives in the index, each version of a claim is its
//! own leaf and earlier versions are never overwritten. The *family* of a
//! claim is its index with the version zeroed; the claims service scans a
//! family for the next free version.
//!
//! Decoding dispatches on the type in the header. A type this codec does not
//! know is reported as [`CodecError::UnknownClaimType`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use idhub_core::IdentityKey;
use idhub_crypto::{CryptoError, ElemBytes, Entry, Hash, Secp256k1PublicKey};

/// Errors from decoding a raw entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The header carries a claim type this codec does not know.
    #[error("unknown claim type {0}")]
    UnknownClaimType(u64),

    /// A key authorization does not hold a valid secp256k1 point.
    #[error("key authorization holds an invalid key: {0}")]
    InvalidKey(#[from] CryptoError),

    /// The entry has the right type but an impossible layout.
    #[error("malformed claim: {0}")]
    Malformed(String),
}

/// Claim type discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum ClaimType {
    /// A secp256k1 key authorized to sign for the identity.
    KeyAuthorization = 1,
    /// An identity's claim-tree root at a version.
    RootPointer = 2,
    /// A registered document hash.
    DocumentRegistration = 3,
}

impl ClaimType {
    /// Map a raw discriminant to a known type.
    pub fn from_u64(raw: u64) -> Option<Self> {
        match raw {
            1 => Some(Self::KeyAuthorization),
            2 => Some(Self::RootPointer),
            3 => Some(Self::DocumentRegistration),
            _ => None,
        }
    }
}

/// Registered document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocType(pub u32);

impl DocType {
    /// A content credential.
    pub const CONTENT_CREDENTIAL: DocType = DocType(1);
}

/// Binds a public key to the tree as an authorized signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAuthorization {
    /// The authorized key.
    pub public_key: Secp256k1PublicKey,
}

/// An identity's claim-tree root, as committed to the root tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootPointer {
    /// Whose tree.
    pub identity: IdentityKey,
    /// Commit sequence number, starting at 1.
    pub version: u32,
    /// The identity tree root at that version.
    pub root: Hash,
}

/// A document registered by hash in its signer's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRegistration {
    /// Hash of the full document.
    pub content_hash: Hash,
    /// Who signed it.
    pub signer: IdentityKey,
    /// What kind of document it is.
    pub doc_type: DocType,
    /// Registration sequence number within the family, starting at 1.
    pub version: u32,
}

/// A typed claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "claimType")]
pub enum Claim {
    /// See [`KeyAuthorization`].
    KeyAuthorization(KeyAuthorization),
    /// See [`RootPointer`].
    RootPointer(RootPointer),
    /// See [`DocumentRegistration`].
    DocumentRegistration(DocumentRegistration),
}

fn header(claim_type: ClaimType, version: u32) -> ElemBytes {
    let mut h = [0u8; 32];
    h[..8].copy_from_slice(&(claim_type as u64).to_be_bytes());
    h[8..12].copy_from_slice(&version.to_be_bytes());
    h
}

fn read_header(entry: &Entry) -> (u64, u32) {
    let h = &entry.index()[0];
    let mut ty = [0u8; 8];
    ty.copy_from_slice(&h[..8]);
    let mut ver = [0u8; 4];
    ver.copy_from_slice(&h[8..12]);
    (u64::from_be_bytes(ty), u32::from_be_bytes(ver))
}

const ZERO: ElemBytes = [0u8; 32];

impl Claim {
    /// The discriminant of this claim.
    pub fn claim_type(&self) -> ClaimType {
        match self {
            Claim::KeyAuthorization(_) => ClaimType::KeyAuthorization,
            Claim::RootPointer(_) => ClaimType::RootPointer,
            Claim::DocumentRegistration(_) => ClaimType::DocumentRegistration,
        }
    }

    /// The version carried in the header. Key authorizations are
    /// unversioned and report 0.
    pub fn version(&self) -> u32 {
        match self {
            Claim::KeyAuthorization(_) => 0,
            Claim::RootPointer(p) => p.version,
            Claim::DocumentRegistration(d) => d.version,
        }
    }

    /// Encode as a raw tree entry.
    pub fn entry(&self) -> Entry {
        match self {
            Claim::KeyAuthorization(k) => {
                let compressed = k.public_key.to_compressed();
                let mut x = [0u8; 32];
                x.copy_from_slice(&compressed[1..]);
                let mut prefix = [0u8; 32];
                prefix[0] = compressed[0];
                Entry::new(
                    [header(ClaimType::KeyAuthorization, 0), x, prefix, ZERO],
                    [ZERO; 4],
                )
            }
            Claim::RootPointer(p) => Entry::new(
                [
                    header(ClaimType::RootPointer, p.version),
                    *p.identity.as_bytes(),
                    ZERO,
                    ZERO,
                ],
                [*p.root.as_bytes(), ZERO, ZERO, ZERO],
            ),
            Claim::DocumentRegistration(d) => {
                let mut doc_type = [0u8; 32];
                doc_type[28..].copy_from_slice(&d.doc_type.0.to_be_bytes());
                Entry::new(
                    [
                        header(ClaimType::DocumentRegistration, d.version),
                        *d.content_hash.as_bytes(),
                        *d.signer.as_bytes(),
                        doc_type,
                    ],
                    [ZERO; 4],
                )
            }
        }
    }

    /// Decode a raw tree entry.
    pub fn from_entry(entry: &Entry) -> Result<Self, CodecError> {
        let (raw_type, version) = read_header(entry);
        let claim_type =
            ClaimType::from_u64(raw_type).ok_or(CodecError::UnknownClaimType(raw_type))?;
        let index = entry.index();
        let value = entry.value();
        match claim_type {
            ClaimType::KeyAuthorization => {
                let mut sec1 = [0u8; 33];
                sec1[0] = index[2][0];
                sec1[1..].copy_from_slice(&index[1]);
                let public_key = Secp256k1PublicKey::from_sec1_bytes(&sec1)?;
                Ok(Claim::KeyAuthorization(KeyAuthorization { public_key }))
            }
            ClaimType::RootPointer => {
                if version == 0 {
                    return Err(CodecError::Malformed("root pointer at version 0".into()));
                }
                Ok(Claim::RootPointer(RootPointer {
                    identity: IdentityKey::from_bytes(index[1]),
                    version,
                    root: Hash(value[0]),
                }))
            }
            ClaimType::DocumentRegistration => {
                let mut doc_type = [0u8; 4];
                doc_type.copy_from_slice(&index[3][28..]);
                Ok(Claim::DocumentRegistration(DocumentRegistration {
                    content_hash: Hash(index[1]),
                    signer: IdentityKey::from_bytes(index[2]),
                    doc_type: DocType(u32::from_be_bytes(doc_type)),
                    version,
                }))
            }
        }
    }
}

/// The index a versioned claim would occupy at `version`.
pub(crate) fn hindex_at(claim: &Claim, version: u32) -> Hash {
    let mut claim = claim.clone();
    match &mut claim {
        Claim::KeyAuthorization(_) => {}
        Claim::RootPointer(p) => p.version = version,
        Claim::DocumentRegistration(d) => d.version = version,
    }
    claim.entry().hindex()
}
