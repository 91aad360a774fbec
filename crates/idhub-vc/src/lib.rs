//! # idhub-vc: Verifiable Credentials for the Identity Hub
//!
//! Provides:
//!
//! - **Content credentials** ([`ContentCredential`]) with a single
//!   `EcdsaSecp256k1Signature2019` linked-data proof. Signing and the
//!   signing input live here; the on-tree authorization check lives in
//!   `idhub-claims`.
//! - **DID documents** ([`Document`], [`DocPublicKey`]) and the
//!   [`DidResolver`] contract used to find a signer's declared key.
//! - **Credential stores** ([`CredentialStore`]) that address a credential
//!   by the Keccak-256 of its full canonical form, proof included.
//!
//! ## Two Canonical Forms
//!
//! The signing input ([`ContentCredential::signing_input`]) excludes
//! `proof.proofValue`. The content hash ([`ContentCredential::content_hash`])
//! covers the whole credential. They serve different purposes and are never
//! interchangeable.

pub mod credential;
pub mod document;
pub mod proof;
pub mod store;

pub use credential::{ContentCredential, CredentialSchema, VcError};
pub use document::{
    validate_public_key, DidResolver, DocPublicKey, Document, DocumentStore, FsDocumentStore,
    InMemoryDocumentStore, ResolverError, DID_CONTEXT_V1,
};
pub use proof::{LinkedDataProof, SECP256K1_SIGNATURE_2019, SECP256K1_VERIFICATION_KEY_2019};
pub use store::{
    parse_content_hash, ContentAddressedStore, CredentialStore, CredentialStoreError,
    MemoryCredentialStore,
};
