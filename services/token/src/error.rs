//! Error taxonomy for issuing, verifying and refreshing tokens.
//!
//! Underlying `jsonwebtoken` failures are normalized into [`VerifyError`]
//! by [`classify`]; anything without a stable category is passed through
//! as [`VerifyError::Other`].

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use std::sync::Arc;
use thiserror::Error;

/// Verification failures.
///
/// `Clone` so a failed outcome can be memoized by the result cache and
/// handed back verbatim on later lookups.
#[derive(Error, Debug, Clone)]
pub enum VerifyError {
    /// Token is structurally unparseable.
    #[error("token is malformed: {0}")]
    TokenMalformed(String),

    /// Token is past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// Token is not yet valid, or no configured key verified its signature.
    #[error("invalid token")]
    InvalidToken,

    /// Declared algorithm differs from the configured one.
    #[error("invalid signing method")]
    InvalidSigningMethod,

    /// No usable key material is configured.
    #[error("signing key is missing")]
    MissingKey,

    /// The claims validator rejected the decoded claims.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// Unclassified failure from the signature collaborator.
    #[error(transparent)]
    Other(Arc<jsonwebtoken::errors::Error>),
}

/// Stable classification of a [`VerifyError`], comparable and cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`VerifyError::TokenMalformed`].
    TokenMalformed,
    /// See [`VerifyError::TokenExpired`].
    TokenExpired,
    /// See [`VerifyError::InvalidToken`].
    InvalidToken,
    /// See [`VerifyError::InvalidSigningMethod`].
    InvalidSigningMethod,
    /// See [`VerifyError::MissingKey`].
    MissingKey,
    /// See [`VerifyError::InvalidClaims`].
    InvalidClaims,
    /// See [`VerifyError::Other`].
    Other,
}

impl ErrorKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TokenMalformed => "token_malformed",
            Self::TokenExpired => "token_expired",
            Self::InvalidToken => "invalid_token",
            Self::InvalidSigningMethod => "invalid_signing_method",
            Self::MissingKey => "missing_key",
            Self::InvalidClaims => "invalid_claims",
            Self::Other => "other",
        }
    }
}

impl VerifyError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenMalformed(_) => ErrorKind::TokenMalformed,
            Self::TokenExpired => ErrorKind::TokenExpired,
            Self::InvalidToken => ErrorKind::InvalidToken,
            Self::InvalidSigningMethod => ErrorKind::InvalidSigningMethod,
            Self::MissingKey => ErrorKind::MissingKey,
            Self::InvalidClaims(_) => ErrorKind::InvalidClaims,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Create a malformed-token error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::TokenMalformed(reason.into())
    }

    /// Create an invalid-claims error.
    #[must_use]
    pub fn invalid_claims(reason: impl Into<String>) -> Self {
        Self::InvalidClaims(reason.into())
    }
}

/// Map an underlying `jsonwebtoken` failure onto the stable taxonomy.
#[must_use]
pub fn classify(err: jsonwebtoken::errors::Error) -> VerifyError {
    match err.kind() {
        JwtErrorKind::InvalidToken
        | JwtErrorKind::Base64(_)
        | JwtErrorKind::Json(_)
        | JwtErrorKind::Utf8(_) => VerifyError::TokenMalformed(err.to_string()),
        JwtErrorKind::ExpiredSignature => VerifyError::TokenExpired,
        JwtErrorKind::ImmatureSignature | JwtErrorKind::InvalidSignature => {
            VerifyError::InvalidToken
        }
        JwtErrorKind::InvalidAlgorithm
        | JwtErrorKind::InvalidAlgorithmName
        | JwtErrorKind::MissingAlgorithm => VerifyError::InvalidSigningMethod,
        _ => VerifyError::Other(Arc::new(err)),
    }
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        classify(err)
    }
}

/// Token generation failures.
#[derive(Error, Debug, Clone)]
pub enum SigningError {
    /// No signing key is configured.
    #[error("signing key is missing")]
    MissingKey,

    /// Key bytes are unusable for the configured algorithm.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// Claims could not be encoded or signed.
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Refresh failures: either the presented token did not verify or the
/// replacement could not be signed.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    /// Verification of the presented token failed.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// Signing the replacement token failed.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Configuration and construction failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment value could not be parsed.
    #[error("Invalid {name}: {reason}")]
    InvalidValue {
        /// Variable name
        name: String,
        /// Parse failure
        reason: String,
    },

    /// A key could not be decoded for the configured algorithm.
    #[error("Invalid {slot} key: {reason}")]
    InvalidKey {
        /// Which key failed (`primary`, `secondary[1]`, ...)
        slot: String,
        /// Decoder failure
        reason: String,
    },

    /// The combination of options is not supported.
    #[error("Unsupported configuration: {0}")]
    Unsupported(String),
}

impl ConfigError {
    /// Create an invalid-value error.
    #[must_use]
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported-configuration error.
    #[must_use]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_error(kind: JwtErrorKind) -> jsonwebtoken::errors::Error {
        jsonwebtoken::errors::Error::from(kind)
    }

    #[test]
    fn test_classify_structural_errors() {
        assert_eq!(
            classify(jwt_error(JwtErrorKind::InvalidToken)).kind(),
            ErrorKind::TokenMalformed
        );
    }

    #[test]
    fn test_classify_temporal_errors() {
        assert_eq!(
            classify(jwt_error(JwtErrorKind::ExpiredSignature)).kind(),
            ErrorKind::TokenExpired
        );
        assert_eq!(
            classify(jwt_error(JwtErrorKind::ImmatureSignature)).kind(),
            ErrorKind::InvalidToken
        );
    }

    #[test]
    fn test_classify_signature_and_algorithm() {
        assert_eq!(
            classify(jwt_error(JwtErrorKind::InvalidSignature)).kind(),
            ErrorKind::InvalidToken
        );
        assert_eq!(
            classify(jwt_error(JwtErrorKind::InvalidAlgorithm)).kind(),
            ErrorKind::InvalidSigningMethod
        );
    }

    #[test]
    fn test_unknown_errors_pass_through() {
        let err = classify(jwt_error(JwtErrorKind::InvalidKeyFormat));
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(
            err.to_string(),
            jwt_error(JwtErrorKind::InvalidKeyFormat).to_string()
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(VerifyError::TokenExpired.to_string(), "token expired");
        assert_eq!(VerifyError::MissingKey.to_string(), "signing key is missing");
        assert_eq!(
            VerifyError::InvalidSigningMethod.to_string(),
            "invalid signing method"
        );

        let err: TokenError = SigningError::MissingKey.into();
        assert_eq!(err.to_string(), "signing key is missing");
    }
}
