//! Shared library for cross-cutting concerns in auth-platform Rust services.
//!
//! Currently provides structured logging setup for binaries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod tracing_config;

pub use tracing_config::{LogFormat, TracingConfig, init_tracing};
