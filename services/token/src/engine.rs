//! One-stop engine wiring signing, verification and refresh over shared keys.

use crate::config::EngineConfig;
use crate::crypto::KeyMaterial;
use crate::error::{ConfigError, SigningError, TokenError, VerifyError};
use crate::jwt::claims::TokenClaims;
use crate::jwt::signer::SigningEngine;
use crate::jwt::verifier::{Parsed, VerificationEngine};
use crate::refresh::RefreshEngine;
use crate::storage::ResultCache;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

/// Issues, verifies and refreshes tokens for one configuration.
#[derive(Debug, Clone)]
pub struct TokenEngine {
    signer: SigningEngine,
    verifier: VerificationEngine,
    refresher: RefreshEngine,
}

impl TokenEngine {
    /// Build an engine with its own result cache as described by
    /// `config.cache`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is inconsistent or a key does
    /// not decode.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let cache = ResultCache::from_config(&config.cache);
        Self::build(&config, cache)
    }

    /// Build an engine around a caller-owned result cache.
    ///
    /// The cache settings in `config` are ignored. Engines sharing a cache
    /// must verify with the same keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is inconsistent or a key does
    /// not decode.
    pub fn with_cache(config: EngineConfig, cache: ResultCache) -> Result<Self, ConfigError> {
        Self::build(&config, Some(cache))
    }

    fn build(config: &EngineConfig, cache: Option<ResultCache>) -> Result<Self, ConfigError> {
        let keys = Arc::new(KeyMaterial::from_config(config)?);
        let signer = SigningEngine::new(Arc::clone(&keys), config);
        let verifier = VerificationEngine::new(keys, config, cache)?;
        let refresher = RefreshEngine::new(verifier.clone(), signer.clone(), config.token_expiry);

        info!(
            algorithm = ?config.algorithm,
            secondary_keys = config.secondary_keys.len(),
            cache = verifier.cache().is_some(),
            "Token engine initialized"
        );

        Ok(Self {
            signer,
            verifier,
            refresher,
        })
    }

    /// See [`SigningEngine::generate`].
    ///
    /// # Errors
    ///
    /// Returns the signing failure.
    pub fn generate<C: TokenClaims>(&self, claims: &mut C) -> Result<String, SigningError> {
        self.signer.generate(claims)
    }

    /// See [`VerificationEngine::parse`].
    ///
    /// # Errors
    ///
    /// Returns the classified verification failure.
    pub fn parse<C: DeserializeOwned>(&self, token: &str) -> Result<Parsed<C>, VerifyError> {
        self.verifier.parse(token)
    }

    /// See [`VerificationEngine::parse_into`].
    ///
    /// # Errors
    ///
    /// Returns the classified verification failure.
    pub fn parse_into<C: DeserializeOwned>(&self, token: &str, out: &mut C) -> Result<(), VerifyError> {
        self.verifier.parse_into(token, out)
    }

    /// See [`RefreshEngine::refresh`].
    ///
    /// # Errors
    ///
    /// Returns the verification or signing failure.
    pub fn refresh<C: TokenClaims>(&self, token: &str, claims: &mut C) -> Result<String, TokenError> {
        self.refresher.refresh(token, claims)
    }

    /// The signing half.
    #[must_use]
    pub const fn signer(&self) -> &SigningEngine {
        &self.signer
    }

    /// The verification half.
    #[must_use]
    pub const fn verifier(&self) -> &VerificationEngine {
        &self.verifier
    }

    /// The attached result cache, if any.
    #[must_use]
    pub const fn cache(&self) -> Option<&ResultCache> {
        self.verifier.cache()
    }
}
