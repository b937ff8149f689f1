//! Verification-result cache keyed by exact token text.
//!
//! The cache is explicit process-scoped state: build one, then hand clones
//! to every engine that should share it. Two engines that share a cache
//! must share key material too, since outcomes are keyed by token text only.

use super::store::{LruStore, OutcomeStore, UnboundedStore};
use crate::config::CacheConfig;
use crate::error::VerifyError;
use crate::metrics;
use serde_json::Value;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// What a cached success carries.
///
/// With [`CacheMode::OutcomeOnly`] a cache hit reports success without
/// claims, so repeated parses of one token into fresh claims values see
/// nothing decoded after the first call. [`CacheMode::OutcomeWithClaims`]
/// keeps the decoded payload so every hit can hand claims back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Memoize success or failure only.
    #[default]
    OutcomeOnly,
    /// Memoize success together with the decoded payload.
    OutcomeWithClaims,
}

/// Memoized result of verifying one token text.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    /// Token verified; `claims` is present in [`CacheMode::OutcomeWithClaims`].
    Valid {
        /// Decoded payload
        claims: Option<Arc<Value>>,
    },
    /// Token failed with this error.
    Failed(VerifyError),
}

impl VerificationOutcome {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Valid { .. } => "valid",
            Self::Failed(err) => err.kind().as_str(),
        }
    }
}

/// Hit and miss counters for a [`ResultCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that fell through to verification
    pub misses: u64,
    /// Entries currently held
    pub entries: usize,
}

struct Inner {
    store: Box<dyn OutcomeStore>,
    mode: CacheMode,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Shared, internally synchronized verification-result cache.
///
/// Cloning is cheap and every clone sees the same entries.
///
/// Entries have no lifetime of their own. In [`CacheMode::OutcomeOnly`] a
/// token that verified keeps reading as valid after its `exp` has passed,
/// for as long as the entry stays in the store. In
/// [`CacheMode::OutcomeWithClaims`] the stored payload lets the verifier
/// check `exp` and `nbf` again on every hit, so expiry is still enforced.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<Inner>,
}

impl ResultCache {
    /// Cache that never evicts.
    #[must_use]
    pub fn unbounded(mode: CacheMode) -> Self {
        Self::with_store(UnboundedStore::new(), mode)
    }

    /// Cache holding at most `capacity` entries, evicting LRU.
    #[must_use]
    pub fn bounded(capacity: NonZeroUsize, mode: CacheMode) -> Self {
        Self::with_store(LruStore::new(capacity), mode)
    }

    /// Cache over a caller-supplied store.
    #[must_use]
    pub fn with_store(store: impl OutcomeStore + 'static, mode: CacheMode) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Box::new(store),
                mode,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Build the cache described by `config`, or `None` when disabled.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(match config.capacity.and_then(NonZeroUsize::new) {
            Some(capacity) => Self::bounded(capacity, config.mode),
            None => Self::unbounded(config.mode),
        })
    }

    /// Mode this cache was built with.
    #[must_use]
    pub fn mode(&self) -> CacheMode {
        self.inner.mode
    }

    /// Look up the outcome for `token`.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<VerificationOutcome> {
        let outcome = self.inner.store.get(token);
        if outcome.is_some() {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_operation("get", "hit");
            debug!("Verification cache hit");
        } else {
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_operation("get", "miss");
            debug!("Verification cache miss");
        }
        outcome
    }

    /// Record the outcome for `token`.
    ///
    /// Claims are dropped from successes unless the cache keeps them.
    pub fn put(&self, token: &str, outcome: VerificationOutcome) {
        let outcome = match (self.inner.mode, outcome) {
            (CacheMode::OutcomeOnly, VerificationOutcome::Valid { .. }) => {
                VerificationOutcome::Valid { claims: None }
            }
            (_, outcome) => outcome,
        };
        metrics::record_cache_operation("put", outcome.label());
        self.inner.store.put(token, outcome);
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// True when no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.store.clear();
    }

    /// Snapshot of hit and miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("mode", &self.inner.mode)
            .field("stats", &self.stats())
            .finish()
    }
}
