//! # idhub-crypto: Cryptographic Primitives
//!
//! Provides the cryptographic building blocks for the identity hub:
//!
//! - **Keccak-256** raw hashing for tree nodes and claim elements.
//! - **secp256k1** key pairs, public keys and 65-byte recoverable
//!   signatures. Signing accepts only `CanonicalBytes`.
//! - **Storage namespaces**: the [`Storage`] trait with prefix-scoped
//!   sub-stores, an in-memory backend and a directory-backed backend.
//! - **Sparse Merkle Tree** ([`MerkleTree`]) with inclusion and
//!   non-inclusion proofs and leaf enumeration under any historical root.
//!
//! ## Crate Policy
//!
//! - Depends only on `idhub-core` internally.
//! - No mocking of cryptographic operations in tests. All tests use real
//!   Keccak-256 and real secp256k1.
//! - No `unsafe` code.

pub mod error;
pub mod hash;
pub mod secp256k1;
pub mod smt;
pub mod storage;

pub use error::{CryptoError, StorageError, TreeError};
pub use hash::{keccak256, Hash};
pub use secp256k1::{RecoverableSignature, Secp256k1KeyPair, Secp256k1PublicKey};
pub use smt::{verify_proof, ElemBytes, Entry, MerkleTree, NodeAux, Proof, DEFAULT_MAX_LEVELS};
pub use storage::{FsStorage, MemoryStorage, Storage, WriteBatch};
