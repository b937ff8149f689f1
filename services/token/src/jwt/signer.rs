//! Token generation.

use crate::config::EngineConfig;
use crate::crypto::KeyMaterial;
use crate::error::SigningError;
use crate::jwt::claims::TokenClaims;
use crate::metrics;
use jsonwebtoken::{Header, encode};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Signs claims with the configured algorithm and signing key.
///
/// When the claims type exposes registered claims, `iat` and `iss` are
/// stamped in place according to configuration before signing, so the
/// caller's value reflects exactly what was signed.
#[derive(Debug, Clone)]
pub struct SigningEngine {
    keys: Arc<KeyMaterial>,
    issuer: Option<String>,
    set_issued_at: bool,
    key_id: Option<String>,
}

impl SigningEngine {
    /// Create a signing engine over shared key material.
    #[must_use]
    pub fn new(keys: Arc<KeyMaterial>, config: &EngineConfig) -> Self {
        Self {
            keys,
            issuer: config.issuer.clone(),
            set_issued_at: config.set_issued_at,
            key_id: config.key_id.clone(),
        }
    }

    /// Sign `claims` into a compact token.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::MissingKey`] when no signing key is configured
    /// and [`SigningError::Encoding`] when claims fail to serialize or sign.
    #[instrument(skip(self, claims), fields(algorithm = ?self.keys.algorithm()))]
    pub fn generate<C: TokenClaims>(&self, claims: &mut C) -> Result<String, SigningError> {
        self.stamp(claims);

        let algorithm = format!("{:?}", self.keys.algorithm());
        let result = self.sign(claims);

        match &result {
            Ok(_) => {
                metrics::record_token_issued(&algorithm, "success");
                debug!("Token issued");
            }
            Err(e) => {
                metrics::record_token_issued(&algorithm, "failure");
                warn!(error = %e, "Token signing failed");
            }
        }
        result
    }

    fn stamp<C: TokenClaims>(&self, claims: &mut C) {
        let Some(registered) = claims.registered_mut() else {
            return;
        };
        if self.set_issued_at {
            registered.iat = Some(chrono::Utc::now().timestamp());
        }
        if let Some(issuer) = &self.issuer {
            registered.iss = Some(issuer.clone());
        }
    }

    fn sign<C: TokenClaims>(&self, claims: &C) -> Result<String, SigningError> {
        let key = self.keys.encoding_key()?;

        let mut header = Header::new(self.keys.algorithm());
        header.kid.clone_from(&self.key_id);

        encode(&header, claims, &key).map_err(|e| SigningError::Encoding(e.to_string()))
    }
}
