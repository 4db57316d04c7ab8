//! Scope validation.
//!
//! A scope parameter is a space-delimited list ([RFC6749 section 3.3]). Every
//! requested scope must be one the client is allowed to request. An absent
//! or empty scope is valid and grants nothing.
//!
//! [RFC6749 section 3.3]: https://www.rfc-editor.org/rfc/rfc6749#section-3.3

use crate::client::OauthClient;
use crate::error::invalid;
use crate::Result;

/// Individual scopes in a space-delimited scope string.
pub fn split(scope: &str) -> impl Iterator<Item = &str> {
    scope.split_ascii_whitespace()
}

/// Whether the space-delimited `scope` string includes `wanted`.
#[must_use]
pub fn contains(scope: &str, wanted: &str) -> bool {
    split(scope).any(|s| s == wanted)
}

/// Validate `requested` against the scopes `client` may request, returning
/// the normalized scope string (single spaces, duplicates removed).
///
/// # Errors
///
/// Returns `invalid_request` when any requested scope is not allowed.
pub fn validate(requested: Option<&str>, client: &OauthClient) -> Result<String> {
    let mut granted: Vec<&str> = vec![];
    for scope in split(requested.unwrap_or_default()) {
        if !client.allows_scope(scope) {
            return Err(invalid!("scope is invalid"));
        }
        if !granted.contains(&scope) {
            granted.push(scope);
        }
    }
    Ok(granted.join(" "))
}
