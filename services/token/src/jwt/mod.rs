//! Token encoding, signing and verification.

pub mod builder;
pub mod claims;
pub mod serializer;
pub mod signer;
pub mod validation;
pub mod verifier;

pub use builder::ClaimsBuilder;
pub use claims::{Claims, RegisteredClaims, TokenClaims};
pub use serializer::RawToken;
pub use signer::SigningEngine;
pub use validation::{ClaimsValidator, ValidatorPlacement};
pub use verifier::{Parsed, VerificationEngine};
