//! Engine configuration snapshot.
//!
//! Everything an engine needs is assembled here before construction and is
//! immutable afterwards. Values can be built in code with the `with_*`
//! methods or loaded from environment variables with [`EngineConfig::from_env`].

use crate::error::ConfigError;
use crate::jwt::validation::{ClaimsValidator, ValidatorPlacement};
use crate::storage::CacheMode;
use jsonwebtoken::Algorithm;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Result cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Memoize verification outcomes
    pub enabled: bool,
    /// Maximum entries; `None` keeps every entry for the process lifetime
    pub capacity: Option<usize>,
    /// Whether cached successes carry decoded claims
    pub mode: CacheMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: None,
            mode: CacheMode::OutcomeOnly,
        }
    }
}

/// Engine configuration.
#[derive(Clone)]
pub struct EngineConfig {
    /// Primary key, tried first and used for signing
    pub primary_key: Vec<u8>,
    /// Secondary keys, tried in order after the primary
    pub secondary_keys: Vec<Vec<u8>>,
    /// Private key for asymmetric algorithms; primary is used when absent
    pub signing_key: Option<Vec<u8>>,
    /// Expected and produced signing algorithm
    pub algorithm: Algorithm,
    /// Lifetime stamped on refreshed tokens; zero disables `exp` rewriting
    pub token_expiry: Duration,
    /// Issuer written into generated tokens
    pub issuer: Option<String>,
    /// Stamp `iat` on generation
    pub set_issued_at: bool,
    /// `kid` header value
    pub key_id: Option<String>,
    /// Clock skew tolerated for `exp` and `nbf`
    pub leeway: Duration,
    /// Result cache settings
    pub cache: CacheConfig,
    /// Optional claims validator
    pub validator: Option<Arc<dyn ClaimsValidator>>,
    /// Where the validator runs relative to the cache
    pub validator_placement: ValidatorPlacement,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_key: Vec::new(),
            secondary_keys: Vec::new(),
            signing_key: None,
            algorithm: Algorithm::HS256,
            token_expiry: Duration::from_secs(2 * 60 * 60),
            issuer: None,
            set_issued_at: true,
            key_id: None,
            leeway: Duration::ZERO,
            cache: CacheConfig::default(),
            validator: None,
            validator_placement: ValidatorPlacement::BeforeCache,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("primary_key", &"[REDACTED]")
            .field("secondary_keys", &self.secondary_keys.len())
            .field("signing_key", &self.signing_key.as_ref().map(|_| "[REDACTED]"))
            .field("algorithm", &self.algorithm)
            .field("token_expiry", &self.token_expiry)
            .field("issuer", &self.issuer)
            .field("set_issued_at", &self.set_issued_at)
            .field("key_id", &self.key_id)
            .field("leeway", &self.leeway)
            .field("cache", &self.cache)
            .field("validator", &self.validator.is_some())
            .field("validator_placement", &self.validator_placement)
            .finish()
    }
}

impl EngineConfig {
    /// Create a configuration with the given primary key and defaults.
    #[must_use]
    pub fn new(primary_key: impl Into<Vec<u8>>) -> Self {
        Self {
            primary_key: primary_key.into(),
            ..Default::default()
        }
    }

    /// Set the primary key.
    #[must_use]
    pub fn with_primary_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.primary_key = key.into();
        self
    }

    /// Append a secondary key.
    #[must_use]
    pub fn with_secondary_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.secondary_keys.push(key.into());
        self
    }

    /// Replace the secondary keys.
    #[must_use]
    pub fn with_secondary_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        self.secondary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set a dedicated signing key (private half for asymmetric algorithms).
    #[must_use]
    pub fn with_signing_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.signing_key = Some(key.into());
        self
    }

    /// Set the signing algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the refresh expiry.
    #[must_use]
    pub const fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Set the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Enable or disable `iat` stamping on generation.
    #[must_use]
    pub const fn with_set_issued_at(mut self, enable: bool) -> Self {
        self.set_issued_at = enable;
        self
    }

    /// Set the `kid` header.
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Set the temporal leeway.
    #[must_use]
    pub const fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Enable the result cache with the given eviction bound and mode.
    #[must_use]
    pub const fn with_cache(mut self, capacity: Option<usize>, mode: CacheMode) -> Self {
        self.cache = CacheConfig {
            enabled: true,
            capacity,
            mode,
        };
        self
    }

    /// Disable the result cache.
    #[must_use]
    pub const fn without_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    /// Install a claims validator.
    #[must_use]
    pub fn with_validator(mut self, validator: impl ClaimsValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Choose where the validator runs relative to the cache.
    #[must_use]
    pub const fn with_validator_placement(mut self, placement: ValidatorPlacement) -> Self {
        self.validator_placement = placement;
        self
    }

    /// Reject option combinations the engines cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] when a validator is meant to run
    /// on every call but cache hits would not carry the claims it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validator.is_some()
            && self.validator_placement == ValidatorPlacement::EveryCall
            && self.cache.enabled
            && self.cache.mode == CacheMode::OutcomeOnly
        {
            return Err(ConfigError::unsupported(
                "validator placement EveryCall needs cache mode OutcomeWithClaims",
            ));
        }
        if self.cache.capacity == Some(0) {
            return Err(ConfigError::invalid_value(
                "cache capacity",
                "must be positive, use None for unbounded",
            ));
        }
        Ok(())
    }

    /// Load configuration from environment variables (and `.env`).
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let primary_key = lookup("JWT_SECRET").unwrap_or_default().into_bytes();
        let secondary_keys = lookup("JWT_SECONDARY_SECRETS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.as_bytes().to_vec())
                    .collect()
            })
            .unwrap_or_default();
        let signing_key = lookup("JWT_SIGNING_KEY").map(String::into_bytes);

        let algorithm = match lookup("JWT_ALGORITHM") {
            Some(raw) => Algorithm::from_str(raw.trim().to_uppercase().as_str())
                .map_err(|e| ConfigError::invalid_value("JWT_ALGORITHM", e.to_string()))?,
            None => defaults.algorithm,
        };

        let token_expiry = Duration::from_secs(parse_env(
            &lookup,
            "JWT_EXPIRES_IN",
            defaults.token_expiry.as_secs(),
        )?);
        let issuer = lookup("JWT_ISSUER").filter(|s| !s.is_empty());
        let set_issued_at = parse_env(&lookup, "JWT_SET_ISSUED_AT", defaults.set_issued_at)?;
        let key_id = lookup("JWT_KEY_ID").filter(|s| !s.is_empty());
        let leeway = Duration::from_secs(parse_env(&lookup, "JWT_LEEWAY", 0u64)?);

        let capacity: usize = parse_env(&lookup, "JWT_CACHE_CAPACITY", 0)?;
        let cache = CacheConfig {
            enabled: parse_env(&lookup, "JWT_CACHE_ENABLED", false)?,
            capacity: (capacity > 0).then_some(capacity),
            mode: if parse_env(&lookup, "JWT_CACHE_CLAIMS", false)? {
                CacheMode::OutcomeWithClaims
            } else {
                CacheMode::OutcomeOnly
            },
        };

        Ok(Self {
            primary_key,
            secondary_keys,
            signing_key,
            algorithm,
            token_expiry,
            issuer,
            set_issued_at,
            key_id,
            leeway,
            cache,
            ..defaults
        })
    }
}

/// Parse a variable with a default when absent.
fn parse_env<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid_value(name, e.to_string())),
        None => Ok(default),
    }
}
