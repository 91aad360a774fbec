//! Per-identity write serialization.
//!
//! One mutex per identity, created on first use and dropped from the map
//! when its last writer releases it, so the map only holds identities with
//! a write in flight. Writers for different identities never contend.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};

use idhub_core::IdentityKey;

/// A registry of per-identity mutexes.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    locks: DashMap<IdentityKey, Arc<Mutex<()>>>,
}

impl IdentityLocks {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex for `identity`, created if absent.
    ///
    /// The map shard is released before the caller locks the returned
    /// handle, so holding one identity's lock never blocks lookups.
    pub fn handle(&self, identity: &IdentityKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(*identity)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop `identity`'s entry if `handle` is it and nobody else holds it.
    ///
    /// Runs under the shard lock, so no other thread can clone the handle
    /// between the count check and the removal.
    fn release(&self, identity: &IdentityKey, handle: &Arc<Mutex<()>>) {
        self.locks.remove_if(identity, |_, current| {
            Arc::ptr_eq(current, handle) && Arc::strong_count(current) == 2
        });
    }

    /// Number of identities with a lock handle outstanding.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True if no identity has a lock handle outstanding.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Run `f` while holding the lock for `identity`.
pub(crate) fn with_identity_lock<T>(
    locks: &IdentityLocks,
    identity: &IdentityKey,
    f: impl FnOnce() -> T,
) -> T {
    let handle = locks.handle(identity);
    let out = {
        let _guard: MutexGuard<'_, ()> = handle.lock();
        f()
    };
    locks.release(identity, &handle);
    out
}
