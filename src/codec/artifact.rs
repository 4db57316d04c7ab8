//! Typed artifacts carried inside encrypted tokens.
//!
//! Each artifact declares the `token_type` discriminant it is sealed with.
//! [`TokenCodec::decode`](super::TokenCodec::decode) refuses a token whose
//! discriminant does not match the requested type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::jose::PublicKeyJwk;

/// Prefix distinguishing a `request_uri` from an arbitrary URL.
pub const REQUEST_URI_PREFIX: &str = "urn:ietf:params:oauth:request_uri:";

/// A protocol artifact that can be sealed in a token.
pub trait Artifact: Serialize + DeserializeOwned {
    /// `token_type` discriminant.
    const TOKEN_TYPE: &'static str;
}

/// Authorization request pushed by a client, carried in the `request_uri`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Always `code`.
    pub response_type: String,

    /// Client that pushed the request.
    pub client_id: String,

    /// Registered redirect URI.
    pub redirect_uri: String,

    /// Space-delimited requested scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client state echoed on the redirect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// PKCE code challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE code challenge method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// Issuer state from the credential offer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,
}

impl Artifact for AuthorizationRequest {
    const TOKEN_TYPE: &'static str = "authorization_request";
}

/// Authorization code issued to the redirect URI after the resource owner
/// authenticates.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationCode {
    /// Client the code was issued to.
    pub client_id: String,

    /// Redirect URI the code was delivered to.
    pub redirect_uri: String,

    /// PKCE code challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE code challenge method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// Authenticated resource owner.
    pub sub: String,

    /// Granted scopes.
    pub scope: String,
}

impl Artifact for AuthorizationCode {
    const TOKEN_TYPE: &'static str = "authorization_code";
}

/// Access token presented to the credential endpoints.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AccessToken {
    /// Client the token was issued to.
    pub client_id: String,

    /// Subject credentials are issued for.
    pub sub: String,

    /// Granted scopes.
    pub scope: String,

    /// Hash of the authorization code exchanged for this token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_code: Option<String>,
}

impl Artifact for AccessToken {
    const TOKEN_TYPE: &'static str = "access_token";
}

/// A `c_nonce` minted by the nonce endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Nonce {
    /// Always the issuer client id.
    pub sub: String,
}

impl Artifact for Nonce {
    const TOKEN_TYPE: &'static str = "c_nonce";
}

/// Issuer state embedded in a credential offer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssuerState {
    /// Always the issuer client id.
    pub sub: String,
}

impl Artifact for IssuerState {
    const TOKEN_TYPE: &'static str = "issuer_state";
}

/// Deferred issuance handle returned as `transaction_id`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Transaction {
    /// Subject credentials are issued for.
    pub sub: String,

    /// Client the access token was issued to.
    pub client_id: String,

    /// Deferred credential configurations.
    pub credential_configuration_ids: Vec<String>,

    /// Holder-binding keys collected from the original request's proofs.
    pub holder_keys: Vec<PublicKeyJwk>,
}

impl Artifact for Transaction {
    const TOKEN_TYPE: &'static str = "transaction";
}
