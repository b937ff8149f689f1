//! In-process memoization of verification outcomes.

pub mod cache;
pub mod store;

pub use cache::{CacheMode, CacheStats, ResultCache, VerificationOutcome};
pub use store::{LruStore, OutcomeStore, UnboundedStore};
