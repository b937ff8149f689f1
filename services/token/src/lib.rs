//! Token engine library.
//!
//! Issues, verifies and refreshes signed JWTs with multi-key rotation,
//! a stable error taxonomy and an optional verification-result cache.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod jwt;
pub mod metrics;
pub mod refresh;
pub mod storage;

// Re-exports for convenience
pub use config::{CacheConfig, EngineConfig};
pub use engine::TokenEngine;
pub use error::{ConfigError, ErrorKind, SigningError, TokenError, VerifyError};
pub use jwt::{
    Claims, ClaimsBuilder, ClaimsValidator, Parsed, RegisteredClaims, SigningEngine, TokenClaims,
    ValidatorPlacement, VerificationEngine,
};
pub use refresh::RefreshEngine;
pub use storage::{CacheMode, ResultCache};
