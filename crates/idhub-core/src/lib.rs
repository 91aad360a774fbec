//! # idhub-core: Foundational Types for the Identity Hub
//!
//! Every other crate in the workspace depends on `idhub-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** [`Did`] validates the
//!    `did:<method>:<id>` shape on construction, and [`IdentityKey`] is its
//!    fixed-width binary encoding. No bare strings cross crate boundaries.
//!
//! 2. **`CanonicalBytes` newtype.** All signing and content-addressing
//!    input flows through [`CanonicalBytes::new()`]. No raw
//!    `serde_json::to_vec()` feeds a hash anywhere in the workspace.
//!
//! 3. **Digests accept only `&CanonicalBytes`.** [`keccak256_digest`]
//!    cannot be called on arbitrary bytes, so every content hash is
//!    computed over the canonical form.
//!
//! 4. **UTC-only timestamps.** [`Timestamp`] is UTC with seconds precision so
//!    that issuance dates canonicalize identically everywhere.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `idhub-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{keccak256_digest, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, ValidationError};
pub use identity::{Did, IdentityKey};
pub use temporal::Timestamp;
