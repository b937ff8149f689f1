//! Verify-then-reissue refresh flow.

use crate::error::TokenError;
use crate::jwt::claims::TokenClaims;
use crate::jwt::signer::SigningEngine;
use crate::jwt::verifier::VerificationEngine;
use crate::metrics;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Verifies a token and mints its replacement with fresh time claims.
#[derive(Debug, Clone)]
pub struct RefreshEngine {
    verifier: VerificationEngine,
    signer: SigningEngine,
    token_expiry: Duration,
}

impl RefreshEngine {
    /// `token_expiry` of zero keeps whatever `exp` the claims carry.
    #[must_use]
    pub const fn new(
        verifier: VerificationEngine,
        signer: SigningEngine,
        token_expiry: Duration,
    ) -> Self {
        RefreshEngine {
            verifier,
            signer,
            token_expiry,
        }
    }

    /// Verify `token` into `claims`, then sign a replacement.
    ///
    /// On success `claims` holds exactly what was signed: `iat` is now and
    /// `exp` is now plus the configured expiry. If verification was answered
    /// by an outcome-only cache, `claims` is not overwritten and the
    /// replacement carries whatever `claims` held on entry.
    ///
    /// `iat` has whole-second resolution: a token refreshed within the
    /// second it was issued gets the same `iat` back.
    ///
    /// # Errors
    ///
    /// Verification errors propagate unchanged; signing errors follow.
    #[instrument(skip(self, token, claims))]
    pub fn refresh<C: TokenClaims>(&self, token: &str, claims: &mut C) -> Result<String, TokenError> {
        if let Err(e) = self.verifier.parse_into(token, claims) {
            metrics::record_token_refreshed(e.kind().as_str());
            debug!(error = %e, "Refresh rejected");
            return Err(e.into());
        }

        self.restamp(claims);

        match self.signer.generate(claims) {
            Ok(token) => {
                metrics::record_token_refreshed("success");
                info!("Token refreshed");
                Ok(token)
            }
            Err(e) => {
                metrics::record_token_refreshed("signing_failed");
                Err(e.into())
            }
        }
    }

    fn restamp<C: TokenClaims>(&self, claims: &mut C) {
        let Some(registered) = claims.registered_mut() else {
            return;
        };
        let now = chrono::Utc::now().timestamp();
        registered.iat = Some(now);

        let expiry = i64::try_from(self.token_expiry.as_secs()).unwrap_or(i64::MAX);
        if expiry > 0 {
            registered.exp = Some(now.saturating_add(expiry));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::crypto::KeyMaterial;
    use crate::error::{ErrorKind, VerifyError};
    use crate::jwt::claims::Claims;
    use crate::storage::{CacheMode, ResultCache};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engines(config: &EngineConfig, cache: Option<ResultCache>) -> (SigningEngine, RefreshEngine) {
        let keys = Arc::new(KeyMaterial::from_config(config).unwrap());
        let signer = SigningEngine::new(Arc::clone(&keys), config);
        let verifier = VerificationEngine::new(keys, config, cache).unwrap();
        (
            signer.clone(),
            RefreshEngine::new(verifier, signer, config.token_expiry),
        )
    }

    fn issued_a_minute_ago() -> Claims {
        let mut claims: Claims = Claims::default();
        claims.registered.sub = Some("user-1".to_string());
        claims.registered.iat = Some(chrono::Utc::now().timestamp() - 60);
        claims
    }

    #[test]
    fn test_refresh_moves_time_claims_forward() {
        let config = EngineConfig::new("k1")
            .with_set_issued_at(false)
            .with_token_expiry(Duration::from_secs(900));
        let (signer, refresher) = engines(&config, None);

        let mut original = issued_a_minute_ago();
        let token = signer.generate(&mut original).unwrap();

        let mut claims: Claims = Claims::default();
        refresher.refresh(&token, &mut claims).unwrap();

        let now = chrono::Utc::now().timestamp();
        assert!(claims.registered.iat > original.registered.iat);
        assert_eq!(claims.registered.sub.as_deref(), Some("user-1"));
        assert!(claims.registered.exp.unwrap() >= now + 899);
    }

    #[test]
    fn test_zero_expiry_keeps_exp() {
        let config = EngineConfig::new("k1").with_token_expiry(Duration::ZERO);
        let (signer, refresher) = engines(&config, None);

        let mut original = issued_a_minute_ago();
        original.registered.exp = Some(chrono::Utc::now().timestamp() + 30);
        let token = signer.generate(&mut original).unwrap();

        let mut claims: Claims = Claims::default();
        refresher.refresh(&token, &mut claims).unwrap();
        assert_eq!(claims.registered.exp, original.registered.exp);
    }

    #[test]
    fn test_verification_errors_propagate() {
        let (_, refresher) = engines(&EngineConfig::new("k1"), None);

        let mut claims: Claims = Claims::default();
        let err = refresher.refresh("a.b", &mut claims).unwrap_err();
        assert!(matches!(
            err,
            TokenError::Verify(ref e) if e.kind() == ErrorKind::TokenMalformed
        ));
    }

    #[test]
    fn test_expired_token_cannot_be_refreshed() {
        let (signer, refresher) = engines(&EngineConfig::new("k1"), None);

        let mut original = issued_a_minute_ago();
        original.registered.exp = Some(chrono::Utc::now().timestamp() - 1);
        let token = signer.generate(&mut original).unwrap();

        let mut claims: Claims = Claims::default();
        let err = refresher.refresh(&token, &mut claims).unwrap_err();
        assert!(matches!(err, TokenError::Verify(VerifyError::TokenExpired)));
    }

    #[test]
    fn test_outcome_only_cache_hit_signs_caller_claims() {
        let cache = ResultCache::unbounded(CacheMode::OutcomeOnly);
        let (signer, refresher) = engines(&EngineConfig::new("k1"), Some(cache));

        let token = signer.generate(&mut issued_a_minute_ago()).unwrap();

        let mut first: Claims = Claims::default();
        refresher.refresh(&token, &mut first).unwrap();
        assert_eq!(first.registered.sub.as_deref(), Some("user-1"));

        let mut second: Claims = Claims::default();
        refresher.refresh(&token, &mut second).unwrap();
        assert!(second.registered.sub.is_none());
    }

    /// Counts events at `WARN` or above.
    struct WarningCounter(Arc<AtomicUsize>);

    impl tracing::Subscriber for WarningCounter {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }

        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}

        fn event(&self, event: &tracing::Event<'_>) {
            if *event.metadata().level() <= tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn enter(&self, _: &tracing::span::Id) {}

        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn test_rejected_tokens_are_not_warnings() {
        let (signer, refresher) = engines(&EngineConfig::new("k1"), None);
        let mut expired = issued_a_minute_ago();
        expired.registered.exp = Some(chrono::Utc::now().timestamp() - 1);
        let token = signer.generate(&mut expired).unwrap();

        let warnings = Arc::new(AtomicUsize::new(0));
        tracing::subscriber::with_default(WarningCounter(Arc::clone(&warnings)), || {
            let mut claims: Claims = Claims::default();
            assert!(refresher.refresh(&token, &mut claims).is_err());
            assert!(refresher.refresh("a.b", &mut claims).is_err());
        });
        assert_eq!(warnings.load(Ordering::SeqCst), 0);
    }
}
