//! Key material and per-key signature checks.

pub mod candidate;
pub mod keys;

pub use candidate::{KeyCandidate, KeyFamily, KeySlot, VerifyingKey};
pub use keys::KeyMaterial;
