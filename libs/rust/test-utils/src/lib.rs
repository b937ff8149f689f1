//! Shared test utilities for auth-platform Rust libraries.
//!
//! This crate provides:
//! - Proptest generators for token claims, keys and malformed input
//! - Test fixtures with sample key material

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use generators::*;
