//! Shared proptest generators for token tests.
//!
//! Generators produce plain data (secrets, identifiers, claim maps) so any
//! crate can build its own domain values from them.

use proptest::prelude::*;
use serde_json::{Map, Value};
use std::time::Duration;

/// Generate HMAC secrets (non-empty, printable).
pub fn secret_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9!@#%^&*_+=-]{8,64}"
}

/// Generate two distinct secrets.
pub fn distinct_secrets_strategy() -> impl Strategy<Value = (String, String)> {
    (secret_strategy(), secret_strategy()).prop_filter("secrets must differ", |(a, b)| a != b)
}

/// Generate a key list with some empty slots mixed in.
pub fn key_list_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop_oneof![3 => secret_strategy(), 1 => Just(String::new())],
        0..5,
    )
}

/// Generate issuer URLs.
pub fn issuer_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,12}".prop_map(|host| format!("https://{host}.example.com"))
}

/// Generate subject identifiers.
pub fn subject_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "user-[a-z0-9]{4,16}",
        "[a-z0-9._%+-]{1,12}@[a-z0-9-]{2,10}\\.[a-z]{2,4}",
        "[a-f0-9]{32}",
    ]
}

/// Generate audience lists.
pub fn audience_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z][a-z0-9-]{2,15}", 1..4)
}

/// Generate scalar JSON values usable as custom claims.
pub fn claim_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[ -~]{0,24}".prop_map(Value::String),
        prop::collection::vec("[a-z]{1,8}", 0..4)
            .prop_map(|items| Value::Array(items.into_iter().map(Value::String).collect())),
    ]
}

/// Generate custom claim maps with keys that never collide with
/// registered claim names.
pub fn custom_claims_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("x_[a-z]{1,10}", claim_value_strategy(), 0..6)
        .prop_map(|claims| claims.into_iter().collect())
}

/// Generate token lifetimes (1 minute to 24 hours).
pub fn ttl_strategy() -> impl Strategy<Value = Duration> {
    (60u64..86400).prop_map(Duration::from_secs)
}

/// Generate strings that are not compact tokens: wrong segment counts or
/// segments that are not base64url.
pub fn malformed_token_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9_-]{0,40}",
        "[A-Za-z0-9_-]{1,20}\\.[A-Za-z0-9_-]{1,20}",
        "[A-Za-z0-9_-]{1,10}(\\.[A-Za-z0-9_-]{1,10}){3,5}",
        "[A-Za-z0-9_-]{4,10}\\.[!$%]{2,8}\\.[A-Za-z0-9_-]{4,10}",
    ]
}

/// Generate HMAC algorithm names.
pub fn hmac_algorithm_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("HS256".to_string()),
        Just("HS384".to_string()),
        Just("HS512".to_string()),
    ]
}

/// Generate asymmetric algorithm names.
pub fn asymmetric_algorithm_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ES256".to_string()),
        Just("ES384".to_string()),
        Just("RS256".to_string()),
        Just("RS384".to_string()),
        Just("RS512".to_string()),
        Just("PS256".to_string()),
        Just("EdDSA".to_string()),
    ]
}
