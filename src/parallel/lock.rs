//! Region Locks
//!
//! Per-key mutual exclusion keyed by a packed `(x, z)` coordinate.
//!
//! ## Usage
//! ```text
//! lock.with(x, z, || load_region(x, z));        // scoped
//! let guard = lock.try_lock_for(x, z, timeout); // manual, bounded
//! ```
//!
//! Distinct keys never contend. A lock object for a key is created on first
//! use and kept for the lifetime of the lock set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex, RwLock};

use crate::codec::pack;

/// Held lock for one key; released when dropped
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct KeyGuard(Option<ArcMutexGuard<RawMutex, ()>>);

impl KeyGuard {
    /// A guard that holds nothing, handed out by [`NoopLock`]
    pub fn detached() -> Self {
        Self(None)
    }

    /// Whether this guard actually holds a lock
    pub fn is_held(&self) -> bool {
        self.0.is_some()
    }

    /// Explicit unlock, equivalent to dropping the guard
    pub fn unlock(self) {}
}

/// A set of per-key locks
///
/// Object safe so the engine can pick an implementation at runtime; the
/// coordinate and closure helpers live on [`GridLockExt`].
pub trait GridLock: Send + Sync {
    /// Block until `key` is locked
    fn lock_key(&self, key: i64) -> KeyGuard;

    /// Lock `key` only if it is free right now
    fn try_lock_key(&self, key: i64) -> Option<KeyGuard>;

    /// Wait at most `timeout` for `key`
    fn try_lock_key_for(&self, key: i64, timeout: Duration) -> Option<KeyGuard>;
}

/// Coordinate and scoped-closure helpers over any [`GridLock`]
pub trait GridLockExt: GridLock {
    fn lock(&self, x: i32, z: i32) -> KeyGuard {
        self.lock_key(pack(x, z))
    }

    fn try_lock(&self, x: i32, z: i32) -> Option<KeyGuard> {
        self.try_lock_key(pack(x, z))
    }

    fn try_lock_for(&self, x: i32, z: i32, timeout: Duration) -> Option<KeyGuard> {
        self.try_lock_key_for(pack(x, z), timeout)
    }

    /// Run `f` while holding the lock for `(x, z)` and return its result.
    /// The lock is released on every exit path, unwinding included.
    fn with_result<R>(&self, x: i32, z: i32, f: impl FnOnce() -> R) -> R {
        self.with_long(pack(x, z), f)
    }

    fn with(&self, x: i32, z: i32, f: impl FnOnce()) {
        self.with_long(pack(x, z), f)
    }

    /// [`GridLockExt::with_result`] for an already packed key
    fn with_long<R>(&self, key: i64, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock_key(key);
        f()
    }
}

impl<L: GridLock + ?Sized> GridLockExt for L {}

/// Growable per-key lock set
#[derive(Default)]
pub struct HyperLock {
    locks: RwLock<HashMap<i64, Arc<Mutex<()>>>>,
}

impl HyperLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys that have ever been locked
    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }

    fn entry(&self, key: i64) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().get(&key) {
            return Arc::clone(lock);
        }

        let mut locks = self.locks.write();
        Arc::clone(locks.entry(key).or_default())
    }
}

impl GridLock for HyperLock {
    fn lock_key(&self, key: i64) -> KeyGuard {
        KeyGuard(Some(self.entry(key).lock_arc()))
    }

    fn try_lock_key(&self, key: i64) -> Option<KeyGuard> {
        self.entry(key)
            .try_lock_arc()
            .map(|guard| KeyGuard(Some(guard)))
    }

    fn try_lock_key_for(&self, key: i64, timeout: Duration) -> Option<KeyGuard> {
        self.entry(key)
            .try_lock_arc_for(timeout)
            .map(|guard| KeyGuard(Some(guard)))
    }
}

impl std::fmt::Debug for HyperLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperLock").field("keys", &self.len()).finish()
    }
}

/// Lock set for single-threaded callers: every acquisition succeeds at once
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLock;

impl GridLock for NoopLock {
    fn lock_key(&self, _key: i64) -> KeyGuard {
        KeyGuard::detached()
    }

    fn try_lock_key(&self, _key: i64) -> Option<KeyGuard> {
        Some(KeyGuard::detached())
    }

    fn try_lock_key_for(&self, _key: i64, _timeout: Duration) -> Option<KeyGuard> {
        Some(KeyGuard::detached())
    }
}
