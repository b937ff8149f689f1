//! Multi-key token verification with result memoization.
//!
//! A parse runs in a fixed order:
//!
//! 1. Cache lookup, when a cache is attached. A memoized failure is
//!    returned as-is. A memoized success is returned as [`Parsed::Cached`],
//!    carrying claims only if the cache keeps them. When it does, `exp`
//!    and `nbf` are checked again first.
//! 2. Structure: three base64url segments, a JSON object header and a JSON
//!    object payload that decodes into the requested claims type.
//! 3. Algorithm: the declared `alg` must equal the configured algorithm.
//! 4. Signature: keys are tried primary first, then secondaries in order.
//!    The first key that verifies wins. When none does, the failure of the
//!    last key tried is reported, or `MissingKey` when there were no keys.
//! 5. Time claims: `exp` and `nbf`, with the configured leeway.
//! 6. Claims validator, when it runs before the cache.
//!
//! The outcome of steps 2 to 6 is written back to the cache.

use crate::config::EngineConfig;
use crate::crypto::KeyMaterial;
use crate::error::{ConfigError, VerifyError, classify};
use crate::jwt::serializer::RawToken;
use crate::jwt::validation::{ClaimsValidator, TemporalClaims, ValidatorPlacement};
use crate::metrics;
use crate::storage::{CacheMode, ResultCache, VerificationOutcome};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Successful parse result.
///
/// Distinguishes a full verification, which always decodes claims, from a
/// cache hit, which decodes claims only when the cache keeps them.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<C> {
    /// Token went through full verification.
    Verified {
        /// Decoded claims
        claims: C,
    },
    /// Token was answered from the result cache.
    Cached {
        /// Decoded claims, present in [`CacheMode::OutcomeWithClaims`]
        claims: Option<C>,
    },
}

impl<C> Parsed<C> {
    /// Decoded claims, if this result carries them.
    #[must_use]
    pub const fn claims(&self) -> Option<&C> {
        match self {
            Self::Verified { claims } | Self::Cached { claims: Some(claims) } => Some(claims),
            Self::Cached { claims: None } => None,
        }
    }

    /// Take the decoded claims, if present.
    #[must_use]
    pub fn into_claims(self) -> Option<C> {
        match self {
            Self::Verified { claims } => Some(claims),
            Self::Cached { claims } => claims,
        }
    }

    /// True when the result came from the cache.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        matches!(self, Self::Cached { .. })
    }
}

/// Verifies tokens against ordered key material.
#[derive(Clone)]
pub struct VerificationEngine {
    keys: Arc<KeyMaterial>,
    leeway: Duration,
    cache: Option<ResultCache>,
    validator: Option<Arc<dyn ClaimsValidator>>,
    placement: ValidatorPlacement,
}

impl VerificationEngine {
    /// Create a verification engine.
    ///
    /// `cache` is the shared result cache to consult, if any; the cache
    /// settings inside `config` are not read here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] when a validator must run on
    /// every call but `cache` does not keep claims for its hits.
    pub fn new(
        keys: Arc<KeyMaterial>,
        config: &EngineConfig,
        cache: Option<ResultCache>,
    ) -> Result<Self, ConfigError> {
        let needs_claims_on_hit =
            config.validator.is_some() && config.validator_placement == ValidatorPlacement::EveryCall;
        if needs_claims_on_hit
            && cache
                .as_ref()
                .is_some_and(|c| c.mode() == CacheMode::OutcomeOnly)
        {
            return Err(ConfigError::unsupported(
                "validator placement EveryCall needs cache mode OutcomeWithClaims",
            ));
        }

        Ok(Self {
            keys,
            leeway: config.leeway,
            cache,
            validator: config.validator.clone(),
            placement: config.validator_placement,
        })
    }

    /// The attached result cache.
    #[must_use]
    pub const fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    /// Verify `token` and decode its claims.
    ///
    /// # Errors
    ///
    /// Returns the classified verification failure, memoized or fresh.
    #[instrument(skip(self, token), fields(token_len = token.len()))]
    pub fn parse<C: DeserializeOwned>(&self, token: &str) -> Result<Parsed<C>, VerifyError> {
        if let Some(cache) = &self.cache {
            if let Some(outcome) = cache.get(token) {
                let result = self.answer_from_cache(cache, token, outcome);
                Self::record("cached", result.as_ref().err());
                return result;
            }
        }

        let result = self.verify::<C>(token);

        if let Some(cache) = &self.cache {
            let outcome = match &result {
                Ok((_, payload)) => VerificationOutcome::Valid {
                    claims: Some(Arc::clone(payload)),
                },
                Err(e) => VerificationOutcome::Failed(e.clone()),
            };
            cache.put(token, outcome);
        }

        let result = result.and_then(|(claims, payload)| {
            if self.placement == ValidatorPlacement::EveryCall {
                self.run_validator(&payload)?;
            }
            Ok(Parsed::Verified { claims })
        });
        Self::record("verified", result.as_ref().err());
        result
    }

    /// Verify `token` and write its claims into `out`.
    ///
    /// `out` is written on full verification, and on cache hits that carry
    /// claims. A hit from an outcome-only cache succeeds and leaves `out`
    /// untouched.
    ///
    /// # Errors
    ///
    /// Same as [`VerificationEngine::parse`]; `out` is untouched on error.
    pub fn parse_into<C: DeserializeOwned>(&self, token: &str, out: &mut C) -> Result<(), VerifyError> {
        if let Some(claims) = self.parse::<C>(token)?.into_claims() {
            *out = claims;
        }
        Ok(())
    }

    /// Hits that carry the payload have their time claims checked again, and
    /// an entry that has since expired is replaced by the failure.
    fn answer_from_cache<C: DeserializeOwned>(
        &self,
        cache: &ResultCache,
        token: &str,
        outcome: VerificationOutcome,
    ) -> Result<Parsed<C>, VerifyError> {
        match outcome {
            VerificationOutcome::Failed(e) => Err(e),
            VerificationOutcome::Valid { claims: None } => Ok(Parsed::Cached { claims: None }),
            VerificationOutcome::Valid {
                claims: Some(payload),
            } => {
                if let Err(kind) = TemporalClaims::from_payload(&payload)?
                    .check(chrono::Utc::now().timestamp(), self.leeway)
                {
                    let err = classify(JwtError::from(kind));
                    cache.put(token, VerificationOutcome::Failed(err.clone()));
                    return Err(err);
                }
                if self.placement == ValidatorPlacement::EveryCall {
                    self.run_validator(&payload)?;
                }
                let claims = C::deserialize(&*payload)
                    .map_err(|e| VerifyError::malformed(format!("payload: {e}")))?;
                Ok(Parsed::Cached {
                    claims: Some(claims),
                })
            }
        }
    }

    /// Steps 2 to 6, without the cache.
    fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<(C, Arc<Value>), VerifyError> {
        let raw = RawToken::parse(token)?;

        let claims = C::deserialize(raw.payload())
            .map_err(|e| VerifyError::malformed(format!("payload: {e}")))?;
        let temporal = TemporalClaims::from_payload(raw.payload())?;

        self.check_algorithm(raw.algorithm())?;
        self.check_signature(&raw)?;

        temporal
            .check(chrono::Utc::now().timestamp(), self.leeway)
            .map_err(|kind| classify(JwtError::from(kind)))?;

        if self.placement == ValidatorPlacement::BeforeCache {
            self.run_validator(raw.payload())?;
        }

        Ok((claims, Arc::new(raw.into_payload())))
    }

    fn check_algorithm(&self, declared: Option<&str>) -> Result<(), VerifyError> {
        let expected = self.keys.algorithm();
        let matches = declared
            .and_then(|alg| alg.parse::<jsonwebtoken::Algorithm>().ok())
            .is_some_and(|alg| alg == expected);

        if matches {
            Ok(())
        } else {
            debug!(declared = ?declared, expected = ?expected, "Algorithm mismatch");
            Err(VerifyError::InvalidSigningMethod)
        }
    }

    fn check_signature(&self, raw: &RawToken<'_>) -> Result<(), VerifyError> {
        let message = raw.signing_input().as_bytes();
        let mut last_error = None;

        for candidate in self.keys.candidates() {
            match candidate.try_verify(message, raw.signature()) {
                Ok(true) => {
                    metrics::record_key_match(candidate.slot().label());
                    debug!(slot = %candidate.slot(), "Signature verified");
                    return Ok(());
                }
                Ok(false) => last_error = Some(JwtError::from(JwtErrorKind::InvalidSignature)),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.map_or(VerifyError::MissingKey, classify))
    }

    fn run_validator(&self, payload: &Value) -> Result<(), VerifyError> {
        match &self.validator {
            Some(validator) => validator
                .validate(payload)
                .map_err(VerifyError::invalid_claims),
            None => Ok(()),
        }
    }

    fn record(source: &str, error: Option<&VerifyError>) {
        let outcome = error.map_or("valid", |e| e.kind().as_str());
        metrics::record_verification(source, outcome);
        if let Some(e) = error {
            debug!(source, error = %e, "Token rejected");
        }
    }
}

impl fmt::Debug for VerificationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationEngine")
            .field("keys", &self.keys)
            .field("leeway", &self.leeway)
            .field("cache", &self.cache)
            .field("validator", &self.validator.is_some())
            .field("placement", &self.placement)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyCandidate, KeySlot};
    use crate::error::ErrorKind;
    use crate::jwt::claims::Claims;
    use crate::jwt::signer::SigningEngine;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn engines(config: &EngineConfig, cache: Option<ResultCache>) -> (SigningEngine, VerificationEngine) {
        let keys = Arc::new(KeyMaterial::from_config(config).unwrap());
        (
            SigningEngine::new(Arc::clone(&keys), config),
            VerificationEngine::new(keys, config, cache).unwrap(),
        )
    }

    fn sign_with(secret: &str, claims: &mut Claims) -> String {
        let config = EngineConfig::new(secret);
        engines(&config, None).0.generate(claims).unwrap()
    }

    fn subject(sub: &str) -> Claims {
        let mut claims = Claims::default();
        claims.registered.sub = Some(sub.to_string());
        claims
    }

    #[test]
    fn test_round_trip() {
        let config = EngineConfig::new("k1");
        let (signer, verifier) = engines(&config, None);

        let mut claims = subject("user-1");
        let token = signer.generate(&mut claims).unwrap();

        let parsed: Parsed<Claims> = verifier.parse(&token).unwrap();
        assert_eq!(parsed, Parsed::Verified { claims });
    }

    #[test]
    fn test_secondary_key_verifies() {
        let token = sign_with("k2", &mut subject("user-1"));
        let config = EngineConfig::new("k1").with_secondary_key("k2");
        let (_, verifier) = engines(&config, None);

        assert!(verifier.parse::<Claims>(&token).is_ok());
    }

    #[test]
    fn test_no_matching_key_is_invalid_token() {
        let token = sign_with("k3", &mut subject("user-1"));
        let config = EngineConfig::new("k1").with_secondary_key("k2");
        let (_, verifier) = engines(&config, None);

        let err = verifier.parse::<Claims>(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn test_no_usable_keys_is_missing_key() {
        let token = sign_with("k1", &mut subject("user-1"));
        let config = EngineConfig::default().with_secondary_key("");
        let (_, verifier) = engines(&config, None);

        let err = verifier.parse::<Claims>(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingKey);
    }

    #[test]
    fn test_algorithm_mismatch_precedes_signature_check() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"user-1"}"#);
        let token = format!("{header}.{payload}.c2lnbmF0dXJl");

        let (_, verifier) = engines(&EngineConfig::new("k1"), None);
        let err = verifier.parse::<Claims>(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSigningMethod);
    }

    #[test]
    fn test_none_algorithm_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"user-1"}"#);
        let token = format!("{header}.{payload}.");

        let (_, verifier) = engines(&EngineConfig::new("k1"), None);
        let err = verifier.parse::<Claims>(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSigningMethod);
    }

    #[test]
    fn test_expired_and_not_yet_valid() {
        let now = chrono::Utc::now().timestamp();
        let (signer, verifier) = engines(&EngineConfig::new("k1"), None);

        let mut expired = subject("user-1");
        expired.registered.exp = Some(now - 1);
        let token = signer.generate(&mut expired).unwrap();
        assert_eq!(
            verifier.parse::<Claims>(&token).unwrap_err().kind(),
            ErrorKind::TokenExpired
        );

        let mut future = subject("user-1");
        future.registered.nbf = Some(now + 3600);
        let token = signer.generate(&mut future).unwrap();
        assert_eq!(
            verifier.parse::<Claims>(&token).unwrap_err().kind(),
            ErrorKind::InvalidToken
        );
    }

    #[test]
    fn test_leeway_accepts_recently_expired() {
        let config = EngineConfig::new("k1").with_leeway(Duration::from_secs(60));
        let (signer, verifier) = engines(&config, None);

        let mut claims = subject("user-1");
        claims.registered.exp = Some(chrono::Utc::now().timestamp() - 5);
        let token = signer.generate(&mut claims).unwrap();

        assert!(verifier.parse::<Claims>(&token).is_ok());
    }

    #[test]
    fn test_outcome_only_cache_hit_skips_claims() {
        let cache = ResultCache::unbounded(CacheMode::OutcomeOnly);
        let (signer, verifier) = engines(&EngineConfig::new("k1"), Some(cache));
        let token = signer.generate(&mut subject("user-1")).unwrap();

        let mut first: Claims = Claims::default();
        verifier.parse_into(&token, &mut first).unwrap();
        assert_eq!(first.registered.sub.as_deref(), Some("user-1"));

        let mut second: Claims = Claims::default();
        verifier.parse_into(&token, &mut second).unwrap();
        assert_eq!(second, Claims::default());
    }

    #[test]
    fn test_claims_cache_hit_returns_claims() {
        let cache = ResultCache::unbounded(CacheMode::OutcomeWithClaims);
        let (signer, verifier) = engines(&EngineConfig::new("k1"), Some(cache));
        let token = signer.generate(&mut subject("user-1")).unwrap();

        assert!(!verifier.parse::<Claims>(&token).unwrap().is_cached());

        let parsed = verifier.parse::<Claims>(&token).unwrap();
        assert!(parsed.is_cached());
        assert_eq!(
            parsed.claims().and_then(|c| c.registered.sub.as_deref()),
            Some("user-1")
        );
    }

    #[test]
    fn test_failures_are_memoized() {
        let cache = ResultCache::unbounded(CacheMode::OutcomeOnly);
        let (_, verifier) = engines(&EngineConfig::new("k1"), Some(cache.clone()));

        let err = verifier.parse::<Claims>("not-a-token").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenMalformed);
        assert!(matches!(
            cache.get("not-a-token"),
            Some(VerificationOutcome::Failed(VerifyError::TokenMalformed(_)))
        ));
    }

    #[test]
    fn test_validator_before_cache_rejection_is_memoized() {
        let cache = ResultCache::unbounded(CacheMode::OutcomeOnly);
        let config = EngineConfig::new("k1").with_validator(|claims: &Value| -> Result<(), String> {
            if claims.get("admin").is_some() {
                Ok(())
            } else {
                Err("admin claim required".to_string())
            }
        });
        let (signer, verifier) = engines(&config, Some(cache));
        let token = signer.generate(&mut subject("user-1")).unwrap();

        for _ in 0..2 {
            let err = verifier.parse::<Claims>(&token).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidClaims);
        }
    }

    #[test]
    fn test_every_call_validator_requires_claims_cache() {
        let config = EngineConfig::new("k1")
            .with_validator(|_: &Value| -> Result<(), String> { Ok(()) })
            .with_validator_placement(ValidatorPlacement::EveryCall);
        let keys = Arc::new(KeyMaterial::from_config(&config).unwrap());

        let outcome_only = ResultCache::unbounded(CacheMode::OutcomeOnly);
        assert!(VerificationEngine::new(Arc::clone(&keys), &config, Some(outcome_only)).is_err());

        let with_claims = ResultCache::unbounded(CacheMode::OutcomeWithClaims);
        assert!(VerificationEngine::new(keys, &config, Some(with_claims)).is_ok());
    }

    struct ScriptedKey {
        slot: KeySlot,
        verdict: fn() -> Result<bool, JwtError>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedKey {
        fn boxed(slot: KeySlot, verdict: fn() -> Result<bool, JwtError>) -> (Box<dyn KeyCandidate>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let key: Box<dyn KeyCandidate> = Box::new(Self {
                slot,
                verdict,
                calls: Arc::clone(&calls),
            });
            (key, calls)
        }
    }

    impl KeyCandidate for ScriptedKey {
        fn slot(&self) -> KeySlot {
            self.slot
        }

        fn try_verify(&self, _: &[u8], _: &str) -> Result<bool, JwtError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            (self.verdict)()
        }
    }

    fn scripted_verifier(candidates: Vec<Box<dyn KeyCandidate>>) -> VerificationEngine {
        let keys = KeyMaterial::from_candidates(jsonwebtoken::Algorithm::HS256, candidates);
        VerificationEngine::new(Arc::new(keys), &EngineConfig::default(), None).unwrap()
    }

    fn unsigned_hs256() -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"user-1"}"#);
        format!("{header}.{payload}.c2ln")
    }

    #[test]
    fn test_last_key_error_is_reported() {
        let (primary, _) = ScriptedKey::boxed(KeySlot::Primary, || {
            Err(JwtError::from(JwtErrorKind::InvalidKeyFormat))
        });
        let (secondary, _) = ScriptedKey::boxed(KeySlot::Secondary(0), || {
            Err(JwtError::from(JwtErrorKind::InvalidAlgorithm))
        });
        let verifier = scripted_verifier(vec![primary, secondary]);

        let err = verifier.parse::<Value>(&unsigned_hs256()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSigningMethod);

        let (primary, _) = ScriptedKey::boxed(KeySlot::Primary, || {
            Err(JwtError::from(JwtErrorKind::InvalidKeyFormat))
        });
        let (secondary, _) = ScriptedKey::boxed(KeySlot::Secondary(0), || Ok(false));
        let verifier = scripted_verifier(vec![primary, secondary]);

        let err = verifier.parse::<Value>(&unsigned_hs256()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn test_scan_stops_at_first_verifying_key() {
        let (primary, primary_calls) = ScriptedKey::boxed(KeySlot::Primary, || Ok(true));
        let (secondary, secondary_calls) = ScriptedKey::boxed(KeySlot::Secondary(0), || Ok(true));
        let verifier = scripted_verifier(vec![primary, secondary]);

        assert!(verifier.parse::<Value>(&unsigned_hs256()).is_ok());
        assert_eq!(primary_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(secondary_calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_later_key_verifies_after_earlier_failures() {
        let (primary, primary_calls) = ScriptedKey::boxed(KeySlot::Primary, || Ok(false));
        let (secondary, secondary_calls) = ScriptedKey::boxed(KeySlot::Secondary(0), || Ok(true));
        let verifier = scripted_verifier(vec![primary, secondary]);

        assert!(verifier.parse::<Value>(&unsigned_hs256()).is_ok());
        assert_eq!(primary_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(secondary_calls.load(AtomicOrdering::SeqCst), 1);
    }

    fn signed_with_k1(header: &str, payload: &str) -> String {
        let message = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = jsonwebtoken::crypto::sign(
            message.as_bytes(),
            &jsonwebtoken::EncodingKey::from_secret(b"k1"),
            jsonwebtoken::Algorithm::HS256,
        )
        .unwrap();
        format!("{message}.{signature}")
    }

    #[test]
    fn test_signed_non_object_segments_are_malformed() {
        let (_, verifier) = engines(&EngineConfig::new("k1"), None);

        let token = signed_with_k1(r#"["HS256"]"#, r#"{"sub":"u"}"#);
        let err = verifier.parse::<Claims>(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenMalformed);

        let token = signed_with_k1(r#"{"alg":"HS256"}"#, "[1, 2]");
        let err = verifier.parse::<Value>(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenMalformed);
    }

    #[test]
    fn test_claims_cache_hit_rechecks_expiry() {
        let cache = ResultCache::unbounded(CacheMode::OutcomeWithClaims);
        let (_, verifier) = engines(&EngineConfig::new("k1"), Some(cache.clone()));

        let expired = serde_json::json!({"sub": "user-1", "exp": chrono::Utc::now().timestamp() - 1});
        cache.put(
            "memoized-token",
            VerificationOutcome::Valid {
                claims: Some(Arc::new(expired)),
            },
        );

        let err = verifier.parse::<Claims>("memoized-token").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenExpired);
        assert!(matches!(
            cache.get("memoized-token"),
            Some(VerificationOutcome::Failed(VerifyError::TokenExpired))
        ));
    }
}
