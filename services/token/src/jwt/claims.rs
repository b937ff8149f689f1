//! Claims types and the trait the engines stamp through.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Claims a token can carry.
///
/// Any serde type works. Types that expose [`RegisteredClaims`] let the
/// engines stamp `iat`, `iss` and `exp`; the rest are signed as given.
pub trait TokenClaims: Serialize + DeserializeOwned {
    /// Mutable access to the registered claims, if this type has them.
    fn registered_mut(&mut self) -> Option<&mut RegisteredClaims> {
        None
    }

    /// Read access to the registered claims, if this type has them.
    fn registered(&self) -> Option<&RegisteredClaims> {
        None
    }
}

/// Registered JWT claims (RFC 7519 section 4.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredClaims {
    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Audience list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Vec<String>>,
    /// Expiry, unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Not before, unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Issued at, unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Token identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl TokenClaims for RegisteredClaims {
    fn registered_mut(&mut self) -> Option<&mut RegisteredClaims> {
        Some(self)
    }

    fn registered(&self) -> Option<&RegisteredClaims> {
        Some(self)
    }
}

/// Registered claims plus application-defined fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Claims<T = HashMap<String, serde_json::Value>> {
    /// Registered claims, flattened into the payload
    #[serde(flatten)]
    pub registered: RegisteredClaims,
    /// Application claims, flattened into the payload
    #[serde(flatten)]
    pub custom: T,
}

impl<T> TokenClaims for Claims<T>
where
    T: Serialize + DeserializeOwned,
{
    fn registered_mut(&mut self) -> Option<&mut RegisteredClaims> {
        Some(&mut self.registered)
    }

    fn registered(&self) -> Option<&RegisteredClaims> {
        Some(&self.registered)
    }
}

impl TokenClaims for HashMap<String, serde_json::Value> {}

impl TokenClaims for serde_json::Value {}
