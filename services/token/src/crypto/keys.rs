//! Immutable key material built once at engine construction.

use super::candidate::{KeyCandidate, KeyFamily, KeySlot, VerifyingKey};
use crate::config::EngineConfig;
use crate::error::{ConfigError, SigningError};
use jsonwebtoken::{Algorithm, EncodingKey};
use std::borrow::Cow;
use std::fmt;
use tracing::warn;
use zeroize::Zeroizing;

enum SigningMaterial {
    Secret(Zeroizing<Vec<u8>>),
    Private(EncodingKey),
}

/// Ordered verification keys plus the signing key, for one algorithm.
///
/// Candidates run primary first, then secondaries in configured order.
/// Empty keys never become candidates. Material with no usable key still
/// builds; every verification then fails with `MissingKey`.
pub struct KeyMaterial {
    algorithm: Algorithm,
    candidates: Vec<Box<dyn KeyCandidate>>,
    signing: Option<SigningMaterial>,
}

impl KeyMaterial {
    /// Decode keys for `algorithm`.
    ///
    /// For HMAC the signing key defaults to `primary`. Asymmetric
    /// algorithms verify with public key PEMs and sign only with an
    /// explicit private `signing` PEM.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] naming the first key that does
    /// not decode.
    pub fn new(
        algorithm: Algorithm,
        primary: &[u8],
        secondaries: &[Vec<u8>],
        signing: Option<&[u8]>,
    ) -> Result<Self, ConfigError> {
        let ordered = std::iter::once((KeySlot::Primary, primary)).chain(
            secondaries
                .iter()
                .enumerate()
                .map(|(i, key)| (KeySlot::Secondary(i), key.as_slice())),
        );

        let candidates = ordered
            .filter(|(_, key)| !key.is_empty())
            .map(|(slot, key)| {
                VerifyingKey::new(slot, algorithm, key)
                    .map(|key| Box::new(key) as Box<dyn KeyCandidate>)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let family = KeyFamily::of(algorithm);
        let signing_bytes = if family.is_symmetric() {
            signing.or(Some(primary))
        } else {
            signing
        }
        .filter(|key| !key.is_empty());

        let signing = signing_bytes
            .map(|key| Self::decode_signing_key(family, key))
            .transpose()?;

        if candidates.is_empty() {
            warn!(
                algorithm = ?algorithm,
                "No usable verification key configured, every parse will fail"
            );
        }

        Ok(Self {
            algorithm,
            candidates,
            signing,
        })
    }

    /// Decode the keys named by `config`.
    ///
    /// # Errors
    ///
    /// See [`KeyMaterial::new`].
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.algorithm,
            &config.primary_key,
            &config.secondary_keys,
            config.signing_key.as_deref(),
        )
    }

    /// Verify-only material over caller-supplied candidates, tried in the
    /// given order.
    #[cfg(test)]
    pub(crate) fn from_candidates(
        algorithm: Algorithm,
        candidates: Vec<Box<dyn KeyCandidate>>,
    ) -> Self {
        Self {
            algorithm,
            candidates,
            signing: None,
        }
    }

    fn decode_signing_key(family: KeyFamily, key: &[u8]) -> Result<SigningMaterial, ConfigError> {
        let decoded = match family {
            KeyFamily::Hmac => return Ok(SigningMaterial::Secret(Zeroizing::new(key.to_vec()))),
            KeyFamily::Rsa => EncodingKey::from_rsa_pem(key),
            KeyFamily::Ec => EncodingKey::from_ec_pem(key),
            KeyFamily::Ed => EncodingKey::from_ed_pem(key),
        };
        decoded
            .map(SigningMaterial::Private)
            .map_err(|e| ConfigError::InvalidKey {
                slot: KeySlot::Signing.to_string(),
                reason: e.to_string(),
            })
    }

    /// Expected and produced algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Verification candidates in precedence order.
    pub fn candidates(&self) -> impl Iterator<Item = &dyn KeyCandidate> {
        self.candidates.iter().map(|key| key.as_ref() as &dyn KeyCandidate)
    }

    /// True when at least one verification key is usable.
    #[must_use]
    pub fn has_verification_key(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// True when tokens can be signed.
    #[must_use]
    pub const fn can_sign(&self) -> bool {
        self.signing.is_some()
    }

    /// Key used to sign new tokens.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::MissingKey`] when no signing key is configured.
    pub fn encoding_key(&self) -> Result<Cow<'_, EncodingKey>, SigningError> {
        match &self.signing {
            Some(SigningMaterial::Secret(secret)) => {
                Ok(Cow::Owned(EncodingKey::from_secret(secret)))
            }
            Some(SigningMaterial::Private(key)) => Ok(Cow::Borrowed(key)),
            None => Err(SigningError::MissingKey),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &self.algorithm)
            .field(
                "candidates",
                &self.candidates().map(|key| key.slot()).collect::<Vec<_>>(),
            )
            .field("can_sign", &self.can_sign())
            .finish()
    }
}
