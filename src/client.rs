//! # Client Registry
//!
//! Static registry of the OAuth clients allowed to use the issuer, plus the
//! issuer's own client. The issuer client is the `sub` of every `c_nonce`
//! and issuer state token, and owns the scopes offered in credential offers.
//!
//! Confidential clients authenticate with a secret at the token endpoint.
//! Public clients are identified by their id and a registered redirect URI.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::client;
use crate::Result;

/// A registered OAuth client.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct OauthClient {
    /// Client identifier.
    pub id: String,

    /// Client secret. Public clients have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Redirect URIs the client registered.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Scopes the client may request.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OauthClient {
    /// Whether `redirect_uri` was registered by the client.
    #[must_use]
    pub fn has_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    /// Whether the client may request `scope`.
    #[must_use]
    pub fn allows_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Lookup of registered clients.
#[derive(Clone, Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, OauthClient>,
    issuer: OauthClient,
}

impl ClientRegistry {
    /// Create a registry. Callers ensure client ids are unique.
    #[must_use]
    pub fn new(clients: Vec<OauthClient>, issuer: OauthClient) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.id.clone(), c)).collect(),
            issuer,
        }
    }

    /// The issuer's own client.
    #[must_use]
    pub const fn issuer(&self) -> &OauthClient {
        &self.issuer
    }

    /// A registered client by id. The issuer client is not included.
    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<&OauthClient> {
        self.clients.get(client_id)
    }

    /// A registered client or the issuer client.
    #[must_use]
    pub fn find(&self, client_id: &str) -> Option<&OauthClient> {
        if client_id == self.issuer.id {
            return Some(&self.issuer);
        }
        self.get(client_id)
    }

    /// Identify a public client by id and registered redirect URI.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for an unknown client or an unregistered
    /// redirect URI.
    pub fn validate_public(&self, client_id: &str, redirect_uri: &str) -> Result<&OauthClient> {
        let Some(client) = self.get(client_id) else {
            return Err(client!("client is invalid"));
        };
        if !client.has_redirect_uri(redirect_uri) {
            return Err(client!("redirect_uri is not registered"));
        }
        Ok(client)
    }

    /// Authenticate a client by id and secret.
    ///
    /// A client registered without a secret is authenticated by id alone.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for an unknown client or a wrong secret.
    pub fn validate_by_secret(&self, client_id: &str, secret: Option<&str>) -> Result<&OauthClient> {
        let Some(client) = self.get(client_id) else {
            return Err(client!("client is invalid"));
        };

        match (&client.secret, secret) {
            (None, _) => Ok(client),
            (Some(expected), Some(given))
                if bool::from(expected.as_bytes().ct_eq(given.as_bytes())) =>
            {
                Ok(client)
            }
            _ => Err(client!("client is invalid")),
        }
    }

    /// Authenticate a confidential client by id and secret.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for an unknown client, a client registered
    /// without a secret, or a wrong secret.
    pub fn validate_confidential(
        &self, client_id: &str, secret: Option<&str>,
    ) -> Result<&OauthClient> {
        let Some(client) = self.get(client_id) else {
            return Err(client!("client is invalid"));
        };
        if client.secret.is_none() {
            return Err(client!("client is not confidential"));
        }
        self.validate_by_secret(client_id, secret)
    }
}
