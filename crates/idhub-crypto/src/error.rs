//! # Cryptographic Error Types
//!
//! Structured errors for key handling, storage namespaces and the Sparse
//! Merkle Tree. Uses `thiserror` for derive-based definitions.

use thiserror::Error;

/// Errors from key parsing, signing and signature recovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(String),

    /// The bytes do not encode a point on secp256k1.
    #[error("invalid secp256k1 public key: {0}")]
    InvalidPublicKey(String),

    /// The bytes are not a valid secp256k1 scalar.
    #[error("invalid secp256k1 private key: {0}")]
    InvalidPrivateKey(String),

    /// A recoverable signature had the wrong length or recovery id.
    #[error("invalid recoverable signature: {0}")]
    InvalidSignature(String),

    /// The signing backend rejected the input.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// No public key could be recovered from the signature.
    #[error("public key recovery failed: {0}")]
    RecoveryFailed(String),
}

/// Errors from a key-value storage namespace.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from a filesystem-backed store.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend holds data that cannot be interpreted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

/// Errors from Sparse Merkle Tree operations.
#[derive(Error, Debug)]
pub enum TreeError {
    /// The exact (index, value) pair is already a leaf of the tree.
    #[error("duplicate leaf: entry with hIndex {0} is already in the tree")]
    DuplicateLeaf(String),

    /// The index is occupied by a leaf with a different value.
    #[error("index already exists: hIndex {0} holds a different value")]
    IndexAlreadyExists(String),

    /// Two indexes share a path prefix longer than the tree depth.
    #[error("reached maximum tree depth of {0} levels")]
    ReachedMaxLevel(usize),

    /// The requested depth is outside `1..=256`.
    #[error("invalid tree depth {0}: must be between 1 and 256")]
    InvalidDepth(usize),

    /// A node referenced by the tree is missing from storage.
    #[error("node {0} not found in storage")]
    NodeNotFound(String),

    /// A stored node could not be decoded.
    #[error("corrupt tree node {key}: {reason}")]
    CorruptNode {
        /// Hex key of the node.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The underlying namespace failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_leaf_display_names_index() {
        let err = TreeError::DuplicateLeaf("abcd".into());
        assert!(err.to_string().contains("abcd"));
        assert!(err.to_string().contains("duplicate leaf"));
    }

    #[test]
    fn storage_error_converts_into_tree_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: TreeError = StorageError::from(io).into();
        assert!(matches!(err, TreeError::Storage(StorageError::Io(_))));
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn max_level_display() {
        assert!(TreeError::ReachedMaxLevel(150).to_string().contains("150"));
    }
}
