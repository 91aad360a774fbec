//! # idhub-claims: Claims Engine
//!
//! Provides:
//!
//! - **Claim codec** ([`Claim`]): key authorizations, root pointers and
//!   document registrations encoded as Sparse Merkle Tree entries, with the
//!   claim type in the high-order bytes of the index header.
//! - **Credential verifier** ([`CredentialVerifier`]): secp256k1 signature
//!   recovery checked against a key that is provably in the signer's tree.
//! - **Claims service** ([`ClaimsService`]): per-identity claim trees, each
//!   mutation anchored into the root commitment tree.
//! - **Identity locks** ([`IdentityLocks`]): per-identity write
//!   serialization.
//!
//! ## Crate Policy
//!
//! - Library code never reads the environment; configuration is passed to
//!   [`ClaimsService::new`].
//! - Enumeration skips leaves it cannot decode and logs them; it never
//!   fails a whole read for one foreign leaf.

pub mod codec;
pub mod error;
pub mod locks;
pub mod service;
pub mod verifier;

pub use codec::{
    Claim, ClaimType, CodecError, DocType, DocumentRegistration, KeyAuthorization, RootPointer,
};
pub use error::ClaimsError;
pub use locks::IdentityLocks;
pub use service::{
    identity_namespace, root_namespace, ClaimReceipt, ClaimsService, ClaimsServiceConfig,
};
pub use verifier::{CredentialVerifier, VerifyError};
