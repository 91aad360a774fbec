//! # Key-Value Storage Namespaces
//!
//! The byte-oriented key-value contract every Sparse Merkle Tree is built
//! on. A store can hand out prefix-scoped sub-stores with
//! [`Storage::with_prefix`]; keys written through a sub-store are stored
//! under `prefix || key` in the parent and are invisible to siblings.
//!
//! Two backends are provided:
//!
//! - [`MemoryStorage`]: a `BTreeMap` behind a `parking_lot::RwLock`.
//!   Batches are applied under one write lock and are atomic.
//! - [`FsStorage`]: one file per key under a directory, named by the hex
//!   encoding of the full key. Each file is written to a temporary name and
//!   renamed into place. Batches are applied in order, so a writer that puts
//!   its commit marker last never exposes a partially written structure.
//!
//! ## Namespace Invariant
//!
//! Callers are responsible for choosing prefixes such that no prefix is a
//! byte prefix of another. The identity hub derives every prefix from a
//! fixed-width hash, which guarantees this.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::StorageError;

/// An ordered list of writes applied by [`Storage::write_batch`].
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push((key.into(), value.into()));
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn prefixed(self, prefix: &[u8]) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + '_ {
        self.ops.into_iter().map(move |(k, v)| (join(prefix, &k), v))
    }
}

/// A byte-oriented key-value store with prefix-scoped namespaces.
pub trait Storage: Send + Sync {
    /// Read a key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a single key.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write_batch(batch)
    }

    /// Apply a batch of writes in order.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Visit every key in this namespace in ascending byte order. Keys are
    /// passed without the namespace prefix. Return `false` from the visitor
    /// to stop early.
    fn iterate(&self, visit: &mut dyn FnMut(&[u8], &[u8]) -> bool) -> Result<(), StorageError>;

    /// A sub-store whose keys live under `prefix` within this namespace.
    fn with_prefix(&self, prefix: &[u8]) -> Arc<dyn Storage>;
}

fn join(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(prefix.len() + key.len());
    full.extend_from_slice(prefix);
    full.extend_from_slice(key);
    full
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-process storage. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    map: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    prefix: Vec<u8>,
}

impl MemoryStorage {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of keys across every namespace.
    pub fn total_keys(&self) -> usize {
        self.map.read().len()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.map.read().get(&join(&self.prefix, key)).cloned())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut map = self.map.write();
        for (k, v) in batch.prefixed(&self.prefix) {
            map.insert(k, v);
        }
        Ok(())
    }

    fn iterate(&self, visit: &mut dyn FnMut(&[u8], &[u8]) -> bool) -> Result<(), StorageError> {
        let map = self.map.read();
        for (k, v) in map.range(self.prefix.clone()..) {
            let Some(rest) = k.strip_prefix(self.prefix.as_slice()) else {
                break;
            };
            if !visit(rest, v) {
                break;
            }
        }
        Ok(())
    }

    fn with_prefix(&self, prefix: &[u8]) -> Arc<dyn Storage> {
        Arc::new(Self {
            map: Arc::clone(&self.map),
            prefix: join(&self.prefix, prefix),
        })
    }
}

// ---------------------------------------------------------------------------
// FsStorage
// ---------------------------------------------------------------------------

/// Directory-backed storage: one file per key.
#[derive(Debug, Clone)]
pub struct FsStorage {
    dir: PathBuf,
    prefix: Vec<u8>,
}

impl FsStorage {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            prefix: Vec::new(),
        })
    }

    /// The directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, full_key: &[u8]) -> PathBuf {
        self.dir.join(hex::encode(full_key))
    }

    fn write_file(&self, full_key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(full_key);
        let tmp = path.with_extension("tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(value)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl Storage for FsStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(&join(&self.prefix, key))) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        for (k, v) in batch.prefixed(&self.prefix) {
            self.write_file(&k, &v)?;
        }
        Ok(())
    }

    fn iterate(&self, visit: &mut dyn FnMut(&[u8], &[u8]) -> bool) -> Result<(), StorageError> {
        let hex_prefix = hex::encode(&self.prefix);
        let mut keys = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let name = dirent?.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&hex_prefix) {
                continue;
            }
            // Skips leftover temporary files and foreign names.
            if let Ok(key) = hex::decode(name) {
                keys.push(key);
            }
        }
        keys.sort();
        for full_key in keys {
            let value = match fs::read(self.path_for(&full_key)) {
                Ok(v) => v,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !visit(&full_key[self.prefix.len()..], &value) {
                break;
            }
        }
        Ok(())
    }

    fn with_prefix(&self, prefix: &[u8]) -> Arc<dyn Storage> {
        Arc::new(Self {
            dir: self.dir.clone(),
            prefix: join(&self.prefix, prefix),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(store: &dyn Storage) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        store
            .iterate(&mut |k, v| {
                out.push((k.to_vec(), v.to_vec()));
                true
            })
            .unwrap();
        out
    }

    fn exercise(root: Arc<dyn Storage>) {
        let a = root.with_prefix(b"\x01aaaa");
        let b = root.with_prefix(b"\x01bbbb");

        a.put(b"k1", b"v1").unwrap();
        let mut batch = WriteBatch::new();
        batch.put(b"k2".to_vec(), b"v2".to_vec());
        batch.put(b"k1".to_vec(), b"v1b".to_vec());
        a.write_batch(batch).unwrap();
        b.put(b"k1", b"other").unwrap();

        assert_eq!(a.get(b"k1").unwrap().as_deref(), Some(&b"v1b"[..]));
        assert_eq!(b.get(b"k1").unwrap().as_deref(), Some(&b"other"[..]));
        assert_eq!(a.get(b"missing").unwrap(), None);

        assert_eq!(
            collect(a.as_ref()),
            vec![
                (b"k1".to_vec(), b"v1b".to_vec()),
                (b"k2".to_vec(), b"v2".to_vec())
            ]
        );
        assert_eq!(collect(b.as_ref()).len(), 1);

        let nested = a.with_prefix(b"k");
        assert_eq!(nested.get(b"2").unwrap().as_deref(), Some(&b"v2"[..]));
        assert_eq!(collect(root.as_ref()).len(), 3);
    }

    #[test]
    fn memory_storage_isolates_namespaces() {
        exercise(Arc::new(MemoryStorage::new()));
    }

    #[test]
    fn fs_storage_isolates_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        exercise(Arc::new(FsStorage::open(dir.path()).unwrap()));
    }

    #[test]
    fn fs_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let s = FsStorage::open(dir.path()).unwrap();
            s.with_prefix(b"ns").put(b"key", b"value").unwrap();
        }
        let s = FsStorage::open(dir.path()).unwrap();
        assert_eq!(
            s.with_prefix(b"ns").get(b"key").unwrap().as_deref(),
            Some(&b"value"[..])
        );
    }

    #[test]
    fn iterate_stops_when_visitor_returns_false() {
        let s = MemoryStorage::new();
        for i in 0u8..5 {
            s.put(&[i], &[i]).unwrap();
        }
        let mut seen = 0;
        s.iterate(&mut |_, _| {
            seen += 1;
            seen < 2
        })
        .unwrap();
        assert_eq!(seen, 2);
        assert_eq!(s.total_keys(), 5);
    }
}
