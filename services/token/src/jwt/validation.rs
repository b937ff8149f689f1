//! Temporal checks and the pluggable claims validator.

use crate::error::VerifyError;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Application-level check run on decoded claims.
///
/// Receives the token payload as JSON so it works for any claims type.
/// Returning `Err(reason)` turns an otherwise valid token into
/// [`VerifyError::InvalidClaims`].
pub trait ClaimsValidator: Send + Sync {
    /// Validate decoded claims.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason.
    fn validate(&self, claims: &Value) -> Result<(), String>;
}

impl<F> ClaimsValidator for F
where
    F: Fn(&Value) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, claims: &Value) -> Result<(), String> {
        self(claims)
    }
}

/// Where the claims validator runs relative to the result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidatorPlacement {
    /// Run during verification; a rejection is cached with the outcome.
    #[default]
    BeforeCache,
    /// Run after the cache on every call that has claims; never cached.
    EveryCall,
}

/// Registered time claims read straight from the payload, whatever the
/// caller's claims type looks like.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TemporalClaims {
    exp: Option<f64>,
    nbf: Option<f64>,
}

impl TemporalClaims {
    /// Read `exp` and `nbf` from a decoded payload object.
    pub(crate) fn from_payload(payload: &Value) -> Result<Self, VerifyError> {
        if !payload.is_object() {
            return Err(VerifyError::malformed("payload is not a JSON object"));
        }
        Self::deserialize(payload)
            .map_err(|e| VerifyError::malformed(format!("invalid time claims: {e}")))
    }

    /// Check `exp` and `nbf` against `now` (unix seconds).
    ///
    /// Expired when `now >= exp + leeway`; not yet valid when
    /// `now + leeway < nbf`.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn check(&self, now: i64, leeway: Duration) -> Result<(), JwtErrorKind> {
        let now = now as f64;
        let leeway = leeway.as_secs_f64();

        if let Some(exp) = self.exp {
            if now >= exp + leeway {
                return Err(JwtErrorKind::ExpiredSignature);
            }
        }
        if let Some(nbf) = self.nbf {
            if now + leeway < nbf {
                return Err(JwtErrorKind::ImmatureSignature);
            }
        }
        Ok(())
    }
}
