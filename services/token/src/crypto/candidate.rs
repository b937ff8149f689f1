//! Verification keys as an ordered chain of capability objects.

use crate::error::ConfigError;
use jsonwebtoken::{Algorithm, DecodingKey, crypto};
use std::fmt;
use zeroize::Zeroizing;

/// Key family an algorithm belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// Shared secret (HS*)
    Hmac,
    /// RSA PEM (RS*, PS*)
    Rsa,
    /// Elliptic curve PEM (ES*)
    Ec,
    /// Ed25519 PEM (EdDSA)
    Ed,
}

impl KeyFamily {
    /// Family of `algorithm`.
    #[must_use]
    pub const fn of(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Self::Hmac,
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Self::Rsa,
            Algorithm::ES256 | Algorithm::ES384 => Self::Ec,
            Algorithm::EdDSA => Self::Ed,
        }
    }

    /// True for shared-secret algorithms.
    #[must_use]
    pub const fn is_symmetric(self) -> bool {
        matches!(self, Self::Hmac)
    }
}

/// Position of a key in the precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    /// The primary key
    Primary,
    /// Secondary key at this index of the configured list
    Secondary(usize),
    /// The dedicated signing key
    Signing,
}

impl KeySlot {
    /// Coarse label for metrics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary(_) => "secondary",
            Self::Signing => "signing",
        }
    }
}

impl fmt::Display for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secondary(index) => write!(f, "secondary[{index}]"),
            other => f.write_str(other.label()),
        }
    }
}

/// One key tried during multi-key verification.
///
/// `try_verify` reports `Ok(false)` for a signature this key did not
/// produce and `Err` when the key cannot run the check at all.
pub trait KeyCandidate: Send + Sync {
    /// Where this key sits in the precedence order.
    fn slot(&self) -> KeySlot;

    /// Check `signature` (base64url) over `message`.
    ///
    /// # Errors
    ///
    /// Returns the underlying failure when verification cannot run.
    fn try_verify(&self, message: &[u8], signature: &str)
    -> Result<bool, jsonwebtoken::errors::Error>;
}

enum Material {
    Secret(Zeroizing<Vec<u8>>),
    Public(DecodingKey),
}

/// Verification key decoded once for a fixed algorithm.
pub struct VerifyingKey {
    slot: KeySlot,
    algorithm: Algorithm,
    material: Material,
}

impl VerifyingKey {
    /// Decode `bytes` as a verification key for `algorithm`.
    ///
    /// Shared secrets are taken as-is; asymmetric algorithms expect a
    /// public key PEM of the matching family.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] when the PEM does not decode.
    pub fn new(slot: KeySlot, algorithm: Algorithm, bytes: &[u8]) -> Result<Self, ConfigError> {
        let material = match KeyFamily::of(algorithm) {
            KeyFamily::Hmac => Ok(Material::Secret(Zeroizing::new(bytes.to_vec()))),
            KeyFamily::Rsa => DecodingKey::from_rsa_pem(bytes).map(Material::Public),
            KeyFamily::Ec => DecodingKey::from_ec_pem(bytes).map(Material::Public),
            KeyFamily::Ed => DecodingKey::from_ed_pem(bytes).map(Material::Public),
        }
        .map_err(|e| ConfigError::InvalidKey {
            slot: slot.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            slot,
            algorithm,
            material,
        })
    }
}

impl KeyCandidate for VerifyingKey {
    fn slot(&self) -> KeySlot {
        self.slot
    }

    fn try_verify(
        &self,
        message: &[u8],
        signature: &str,
    ) -> Result<bool, jsonwebtoken::errors::Error> {
        match &self.material {
            Material::Secret(secret) => crypto::verify(
                signature,
                message,
                &DecodingKey::from_secret(secret),
                self.algorithm,
            ),
            Material::Public(key) => crypto::verify(signature, message, key, self.algorithm),
        }
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyingKey")
            .field("slot", &self.slot)
            .field("algorithm", &self.algorithm)
            .field("material", &"[REDACTED]")
            .finish()
    }
}
