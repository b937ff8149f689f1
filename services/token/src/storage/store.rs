//! Backing stores for the verification-result cache.
//!
//! The eviction policy is a swappable [`OutcomeStore`]: [`UnboundedStore`]
//! keeps every entry for the process lifetime, [`LruStore`] caps the entry
//! count and drops the least recently used token first.

use super::cache::VerificationOutcome;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Internally synchronized map from raw token text to outcome.
///
/// Concurrent `put`s for the same key may race; either value can win.
/// Outcomes for a given token text are deterministic so the race is benign.
pub trait OutcomeStore: Send + Sync {
    /// Look up the outcome recorded for `token`.
    fn get(&self, token: &str) -> Option<VerificationOutcome>;

    /// Record the outcome for `token`.
    fn put(&self, token: &str, outcome: VerificationOutcome);

    /// Number of entries held.
    fn len(&self) -> usize;

    /// True when no entries are held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    fn clear(&self);
}

/// Store without eviction.
#[derive(Debug, Default)]
pub struct UnboundedStore {
    entries: RwLock<HashMap<String, VerificationOutcome>>,
}

impl UnboundedStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutcomeStore for UnboundedStore {
    fn get(&self, token: &str) -> Option<VerificationOutcome> {
        self.entries.read().get(token).cloned()
    }

    fn put(&self, token: &str, outcome: VerificationOutcome) {
        self.entries.write().insert(token.to_owned(), outcome);
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Store bounded to a fixed number of entries with LRU eviction.
pub struct LruStore {
    entries: Mutex<LruCache<String, VerificationOutcome>>,
    capacity: NonZeroUsize,
}

impl LruStore {
    /// Create a store holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }
}

impl std::fmt::Debug for LruStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruStore")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl OutcomeStore for LruStore {
    fn get(&self, token: &str) -> Option<VerificationOutcome> {
        // get() promotes the entry, hence the exclusive lock
        self.entries.lock().get(token).cloned()
    }

    fn put(&self, token: &str, outcome: VerificationOutcome) {
        self.entries.lock().put(token.to_owned(), outcome);
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}
