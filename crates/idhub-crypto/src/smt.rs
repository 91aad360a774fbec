//! # Sparse Merkle Tree
//!
//! An authenticated mapping from a 256-bit index hash to a 256-bit value
//! hash, stored as content-addressed nodes in a [`Storage`] namespace.
//!
//! ## Structure
//!
//! A binary trie over the bits of `hIndex` (most significant bit first),
//! bounded at `max_levels` levels. Three node kinds:
//!
//! - Empty: key is [`Hash::ZERO`], never stored.
//! - Leaf: key `Keccak256(0x00 || hIndex || hValue)`. Stores the full entry.
//! - Middle: key `Keccak256(0x01 || left || right)`.
//!
//! A leaf sits at the shallowest level at which its path prefix is unique,
//! so the shape (and therefore the root) depends only on the set of leaves,
//! not on insertion order.
//!
//! ## Entries
//!
//! An [`Entry`] is four 32-byte index elements and four 32-byte value
//! elements. `hIndex = Keccak256(index[0] || .. || index[3])` and
//! `hValue = Keccak256(value[0] || .. || value[3])`.
//!
//! ## History
//!
//! Nodes are never deleted. Every root the tree has ever had remains
//! readable, so [`MerkleTree::dump_leaves`], [`MerkleTree::get_value`] and
//! [`MerkleTree::generate_proof`] accept any historical root.
//!
//! ## Persistence
//!
//! [`MerkleTree::add`] collects every new node into one [`WriteBatch`] and
//! appends the new root pointer last. Nothing is written if the insertion
//! fails.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::hash::{keccak256, keccak256_concat, Hash};
use crate::storage::{Storage, WriteBatch};

/// Default tree depth.
pub const DEFAULT_MAX_LEVELS: usize = 150;

/// One 32-byte entry element.
pub type ElemBytes = [u8; 32];

const LEAF_TAG: u8 = 0x00;
const MIDDLE_TAG: u8 = 0x01;

const NODE_KEY_PREFIX: u8 = b'n';
const ROOT_KEY: &[u8] = b"root";

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A raw tree leaf: four index elements and four value elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    index: [ElemBytes; 4],
    value: [ElemBytes; 4],
}

impl Entry {
    /// Build an entry from its elements.
    pub fn new(index: [ElemBytes; 4], value: [ElemBytes; 4]) -> Self {
        Self { index, value }
    }

    /// The index elements.
    pub fn index(&self) -> &[ElemBytes; 4] {
        &self.index
    }

    /// The value elements.
    pub fn value(&self) -> &[ElemBytes; 4] {
        &self.value
    }

    /// `Keccak256` over the concatenated index elements.
    pub fn hindex(&self) -> Hash {
        Hash(keccak256(&self.index.concat()))
    }

    /// `Keccak256` over the concatenated value elements.
    pub fn hvalue(&self) -> Hash {
        Hash(keccak256(&self.value.concat()))
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        for elem in self.index.iter().chain(self.value.iter()) {
            out.extend_from_slice(elem);
        }
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 8 * 32 {
            return None;
        }
        let mut elems = [[0u8; 32]; 8];
        for (elem, chunk) in elems.iter_mut().zip(bytes.chunks_exact(32)) {
            elem.copy_from_slice(chunk);
        }
        Some(Self {
            index: [elems[0], elems[1], elems[2], elems[3]],
            value: [elems[4], elems[5], elems[6], elems[7]],
        })
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Empty,
    Leaf(Entry),
    Middle { left: Hash, right: Hash },
}

impl Node {
    fn key(&self) -> Hash {
        match self {
            Node::Empty => Hash::ZERO,
            Node::Leaf(entry) => leaf_key(&entry.hindex(), &entry.hvalue()),
            Node::Middle { left, right } => middle_key(left, right),
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            Node::Empty => Vec::new(),
            Node::Leaf(entry) => {
                let mut out = Vec::with_capacity(1 + 8 * 32);
                out.push(LEAF_TAG);
                entry.encode_into(&mut out);
                out
            }
            Node::Middle { left, right } => {
                let mut out = Vec::with_capacity(1 + 64);
                out.push(MIDDLE_TAG);
                out.extend_from_slice(left.as_bytes());
                out.extend_from_slice(right.as_bytes());
                out
            }
        }
    }

    fn decode(key: &Hash, bytes: &[u8]) -> Result<Self, TreeError> {
        let corrupt = |reason: &str| TreeError::CorruptNode {
            key: key.to_hex(),
            reason: reason.to_string(),
        };
        match bytes.split_first() {
            Some((&LEAF_TAG, rest)) => Entry::decode(rest)
                .map(Node::Leaf)
                .ok_or_else(|| corrupt("leaf body must be 256 bytes")),
            Some((&MIDDLE_TAG, rest)) if rest.len() == 64 => {
                let mut left = [0u8; 32];
                let mut right = [0u8; 32];
                left.copy_from_slice(&rest[..32]);
                right.copy_from_slice(&rest[32..]);
                Ok(Node::Middle {
                    left: Hash(left),
                    right: Hash(right),
                })
            }
            Some((&MIDDLE_TAG, _)) => Err(corrupt("middle body must be 64 bytes")),
            Some((tag, _)) => Err(corrupt(&format!("unknown node tag {tag:#04x}"))),
            None => Err(corrupt("empty node body")),
        }
    }
}

fn leaf_key(hindex: &Hash, hvalue: &Hash) -> Hash {
    Hash(keccak256_concat(&[
        &[LEAF_TAG][..],
        &hindex.as_bytes()[..],
        &hvalue.as_bytes()[..],
    ]))
}

fn middle_key(left: &Hash, right: &Hash) -> Hash {
    Hash(keccak256_concat(&[
        &[MIDDLE_TAG][..],
        &left.as_bytes()[..],
        &right.as_bytes()[..],
    ]))
}

fn node_storage_key(key: &Hash) -> Vec<u8> {
    let mut out = Vec::with_capacity(33);
    out.push(NODE_KEY_PREFIX);
    out.extend_from_slice(key.as_bytes());
    out
}

/// Bit `lvl` of `hash`, most significant bit of byte 0 first.
fn path_bit(hash: &Hash, lvl: usize) -> bool {
    (hash.0[lvl / 8] >> (7 - (lvl % 8))) & 1 == 1
}

// ---------------------------------------------------------------------------
// Proofs
// ---------------------------------------------------------------------------

/// The leaf found at the end of a non-existence path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAux {
    /// hIndex of the leaf occupying the path.
    pub hindex: Hash,
    /// hValue of that leaf.
    pub hvalue: Hash,
}

/// Proof of existence or non-existence of an index under a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// True if the proof shows that the index is in the tree.
    pub existence: bool,
    /// Sibling hashes from the root down to the terminal node.
    pub siblings: Vec<Hash>,
    /// For non-existence ending in another leaf, that leaf.
    pub node_aux: Option<NodeAux>,
}

/// Check `proof` against `root`.
///
/// For an existence proof, returns true iff the leaf `(hindex, hvalue)` is in
/// the tree with that root. For a non-existence proof, returns true iff the
/// proof shows `hindex` is absent; `hvalue` is ignored.
pub fn verify_proof(root: &Hash, proof: &Proof, hindex: &Hash, hvalue: &Hash) -> bool {
    let mut key = if proof.existence {
        leaf_key(hindex, hvalue)
    } else {
        match &proof.node_aux {
            Some(aux) if aux.hindex == *hindex => return false,
            Some(aux) => leaf_key(&aux.hindex, &aux.hvalue),
            None => Hash::ZERO,
        }
    };
    if proof.siblings.len() > 256 {
        return false;
    }
    for (lvl, sibling) in proof.siblings.iter().enumerate().rev() {
        key = if path_bit(hindex, lvl) {
            middle_key(sibling, &key)
        } else {
            middle_key(&key, sibling)
        };
    }
    key == *root
}

// ---------------------------------------------------------------------------
// MerkleTree
// ---------------------------------------------------------------------------

/// A Sparse Merkle Tree over one storage namespace.
///
/// The handle caches the current root. Two handles over the same namespace
/// do not see each other's insertions until reopened; callers that share a
/// namespace across threads must serialize writers externally.
pub struct MerkleTree {
    storage: Arc<dyn Storage>,
    root: Hash,
    max_levels: usize,
}

impl std::fmt::Debug for MerkleTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerkleTree")
            .field("root", &self.root)
            .field("max_levels", &self.max_levels)
            .finish()
    }
}

impl MerkleTree {
    /// Open the tree stored in `storage`, or an empty tree if none exists.
    pub fn open(storage: Arc<dyn Storage>, max_levels: usize) -> Result<Self, TreeError> {
        if max_levels == 0 || max_levels > 256 {
            return Err(TreeError::InvalidDepth(max_levels));
        }
        let root = match storage.get(ROOT_KEY)? {
            None => Hash::ZERO,
            Some(bytes) => {
                let arr: [u8; 32] =
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| TreeError::CorruptNode {
                            key: "root".to_string(),
                            reason: format!("root pointer must be 32 bytes, got {}", bytes.len()),
                        })?;
                Hash(arr)
            }
        };
        Ok(Self {
            storage,
            root,
            max_levels,
        })
    }

    /// The current root.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// The configured depth.
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Insert an entry.
    ///
    /// # Errors
    ///
    /// - [`TreeError::DuplicateLeaf`] if the exact entry is already present.
    /// - [`TreeError::IndexAlreadyExists`] if its index holds another value.
    /// - [`TreeError::ReachedMaxLevel`] if the path would exceed the depth.
    /// - [`TreeError::Storage`] on namespace I/O failure.
    pub fn add(&mut self, entry: &Entry) -> Result<(), TreeError> {
        let hindex = entry.hindex();
        let mut batch = WriteBatch::new();
        let new_root = self.add_leaf(&mut batch, entry, &hindex, self.root, 0)?;
        batch.put(ROOT_KEY, new_root.as_bytes().to_vec());
        self.storage.write_batch(batch)?;
        tracing::debug!(hindex = %hindex, old_root = %self.root, new_root = %new_root, "smt leaf added");
        self.root = new_root;
        Ok(())
    }

    fn add_leaf(
        &self,
        batch: &mut WriteBatch,
        entry: &Entry,
        hindex: &Hash,
        key: Hash,
        lvl: usize,
    ) -> Result<Hash, TreeError> {
        if lvl >= self.max_levels {
            return Err(TreeError::ReachedMaxLevel(self.max_levels));
        }
        match self.get_node(&key)? {
            Node::Empty => Ok(put_node(batch, Node::Leaf(entry.clone()))),
            Node::Leaf(old) => {
                let old_hindex = old.hindex();
                if old_hindex == *hindex {
                    return Err(if old.hvalue() == entry.hvalue() {
                        TreeError::DuplicateLeaf(hindex.to_hex())
                    } else {
                        TreeError::IndexAlreadyExists(hindex.to_hex())
                    });
                }
                self.push_leaf(batch, entry, hindex, key, &old_hindex, lvl)
            }
            Node::Middle { left, right } => {
                let node = if path_bit(hindex, lvl) {
                    let right = self.add_leaf(batch, entry, hindex, right, lvl + 1)?;
                    Node::Middle { left, right }
                } else {
                    let left = self.add_leaf(batch, entry, hindex, left, lvl + 1)?;
                    Node::Middle { left, right }
                };
                Ok(put_node(batch, node))
            }
        }
    }

    /// Push an existing leaf down until its path diverges from the new one.
    fn push_leaf(
        &self,
        batch: &mut WriteBatch,
        entry: &Entry,
        hindex: &Hash,
        old_key: Hash,
        old_hindex: &Hash,
        lvl: usize,
    ) -> Result<Hash, TreeError> {
        if lvl + 1 >= self.max_levels {
            return Err(TreeError::ReachedMaxLevel(self.max_levels));
        }
        let new_bit = path_bit(hindex, lvl);
        if new_bit == path_bit(old_hindex, lvl) {
            let child = self.push_leaf(batch, entry, hindex, old_key, old_hindex, lvl + 1)?;
            let node = if new_bit {
                Node::Middle {
                    left: Hash::ZERO,
                    right: child,
                }
            } else {
                Node::Middle {
                    left: child,
                    right: Hash::ZERO,
                }
            };
            return Ok(put_node(batch, node));
        }
        let new_key = put_node(batch, Node::Leaf(entry.clone()));
        let node = if new_bit {
            Node::Middle {
                left: old_key,
                right: new_key,
            }
        } else {
            Node::Middle {
                left: new_key,
                right: old_key,
            }
        };
        Ok(put_node(batch, node))
    }

    fn get_node(&self, key: &Hash) -> Result<Node, TreeError> {
        if key.is_zero() {
            return Ok(Node::Empty);
        }
        let bytes = self
            .storage
            .get(&node_storage_key(key))?
            .ok_or_else(|| TreeError::NodeNotFound(key.to_hex()))?;
        Node::decode(key, &bytes)
    }

    /// Look up the entry at `hindex` under `root`.
    pub fn get_value(&self, hindex: &Hash, root: &Hash) -> Result<Option<Entry>, TreeError> {
        let mut key = *root;
        for lvl in 0..self.max_levels {
            match self.get_node(&key)? {
                Node::Empty => return Ok(None),
                Node::Leaf(entry) => {
                    return Ok((entry.hindex() == *hindex).then_some(entry));
                }
                Node::Middle { left, right } => {
                    key = if path_bit(hindex, lvl) { right } else { left };
                }
            }
        }
        Err(TreeError::ReachedMaxLevel(self.max_levels))
    }

    /// Build an existence or non-existence proof for `hindex` under `root`.
    pub fn generate_proof(&self, hindex: &Hash, root: &Hash) -> Result<Proof, TreeError> {
        let mut siblings = Vec::new();
        let mut key = *root;
        for lvl in 0..self.max_levels {
            match self.get_node(&key)? {
                Node::Empty => {
                    return Ok(Proof {
                        existence: false,
                        siblings,
                        node_aux: None,
                    })
                }
                Node::Leaf(entry) => {
                    let leaf_hindex = entry.hindex();
                    if leaf_hindex == *hindex {
                        return Ok(Proof {
                            existence: true,
                            siblings,
                            node_aux: None,
                        });
                    }
                    return Ok(Proof {
                        existence: false,
                        siblings,
                        node_aux: Some(NodeAux {
                            hindex: leaf_hindex,
                            hvalue: entry.hvalue(),
                        }),
                    });
                }
                Node::Middle { left, right } => {
                    if path_bit(hindex, lvl) {
                        siblings.push(left);
                        key = right;
                    } else {
                        siblings.push(right);
                        key = left;
                    }
                }
            }
        }
        Err(TreeError::ReachedMaxLevel(self.max_levels))
    }

    /// True if exactly this entry is a leaf under the current root, checked
    /// by generating and verifying an inclusion proof.
    pub fn entry_exists(&self, entry: &Entry) -> Result<bool, TreeError> {
        let hindex = entry.hindex();
        let proof = self.generate_proof(&hindex, &self.root)?;
        Ok(proof.existence && verify_proof(&self.root, &proof, &hindex, &entry.hvalue()))
    }

    /// Every leaf under `root`, left to right.
    pub fn dump_leaves(&self, root: &Hash) -> Result<Vec<Entry>, TreeError> {
        let mut leaves = Vec::new();
        let mut stack = vec![*root];
        while let Some(key) = stack.pop() {
            match self.get_node(&key)? {
                Node::Empty => {}
                Node::Leaf(entry) => leaves.push(entry),
                Node::Middle { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        Ok(leaves)
    }
}

fn put_node(batch: &mut WriteBatch, node: Node) -> Hash {
    let key = node.key();
    batch.put(node_storage_key(&key), node.encode());
    key
}
