//! Fluent claims construction.

use crate::jwt::claims::{Claims, RegisteredClaims};
use std::collections::HashMap;

/// Fluent construction of [`Claims`] with timestamps taken at `build` time.
pub struct ClaimsBuilder {
    issuer: Option<String>,
    subject: Option<String>,
    audience: Vec<String>,
    ttl_seconds: Option<i64>,
    not_before_offset: Option<i64>,
    with_jti: bool,
    custom_claims: HashMap<String, serde_json::Value>,
}

impl Default for ClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsBuilder {
    /// Empty builder: no expiry, no `jti`, no custom claims.
    #[must_use]
    pub fn new() -> Self {
        ClaimsBuilder {
            issuer: None,
            subject: None,
            audience: Vec::new(),
            ttl_seconds: None,
            not_before_offset: None,
            with_jti: false,
            custom_claims: HashMap::new(),
        }
    }

    /// Set `iss`.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set `sub`.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set `aud`; an empty list leaves it unset.
    pub fn audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Lifetime relative to now; negative values produce an expired token.
    pub fn ttl_seconds(mut self, ttl: i64) -> Self {
        self.ttl_seconds = Some(ttl);
        self
    }

    /// `nbf` relative to now.
    pub fn not_before_offset(mut self, offset: i64) -> Self {
        self.not_before_offset = Some(offset);
        self
    }

    /// Stamp a random UUID `jti`.
    pub fn unique_id(mut self) -> Self {
        self.with_jti = true;
        self
    }

    /// Add an application claim.
    pub fn custom_claim(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom_claims.insert(key.into(), value);
        self
    }

    /// Finish the claims. `iat` is left for the signer to stamp.
    pub fn build(self) -> Claims {
        let now = chrono::Utc::now().timestamp();

        Claims {
            registered: RegisteredClaims {
                iss: self.issuer,
                sub: self.subject,
                aud: (!self.audience.is_empty()).then_some(self.audience),
                exp: self.ttl_seconds.map(|ttl| now + ttl),
                nbf: self.not_before_offset.map(|offset| now + offset),
                iat: None,
                jti: self.with_jti.then(|| uuid::Uuid::new_v4().to_string()),
            },
            custom: self.custom_claims,
        }
    }
}
