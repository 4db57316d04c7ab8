//! # Request and Response Types
//!
//! Wire types for the issuer's endpoints. Requests are deserialized by the
//! host from form or JSON bodies; HTTP details the pipelines depend on
//! (method, URI, `Authorization` and `DPoP` headers) travel separately in
//! [`HttpContext`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use crate::codec::AuthorizationRequest;

/// Request details used to authenticate calls to the credential endpoints.
#[derive(Clone, Debug, Default)]
pub struct HttpContext {
    /// HTTP method.
    pub method: String,

    /// Absolute request URI, as the client addressed it.
    pub uri: String,

    /// `Authorization` header value.
    pub authorization: Option<String>,

    /// Every `DPoP` header value received.
    pub dpop: Vec<String>,
}

/// Pushed Authorization Request ([RFC9126]).
///
/// [RFC9126]: https://www.rfc-editor.org/rfc/rfc9126
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ParRequest {
    /// Must be `code`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,

    /// Client identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Redirect URI registered by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Space-delimited requested scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client state echoed on the redirect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// PKCE code challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE code challenge method, `S256` or `plain`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// Issuer state from a credential offer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,
}

/// Pushed Authorization Response.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ParResponse {
    /// Reference to the pushed request, used at the authorization endpoint.
    pub request_uri: String,

    /// Lifetime of the `request_uri`, in seconds.
    pub expires_in: u64,
}

/// Authorization Request referencing a pushed request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizeRequest {
    /// Client identifier.
    pub client_id: String,

    /// `request_uri` returned by the PAR endpoint.
    pub request_uri: String,

    /// The resource owner, once the host has authenticated them.
    #[serde(skip)]
    pub resource_owner: Option<ResourceOwner>,
}

/// An authenticated resource owner.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ResourceOwner {
    /// Subject identifier credentials are issued for.
    pub sub: String,
}

/// Authorization Response.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizeResponse {
    /// No resource owner yet: the decoded request, for rendering a login UI.
    Login(AuthorizationRequest),

    /// Redirect to the client with an authorization code.
    Redirect(String),
}

/// Token Request. `grant_type` selects which other fields apply.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenRequest {
    /// `client_credentials` or `authorization_code`.
    pub grant_type: String,

    /// Client identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Client secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Space-delimited requested scopes (`client_credentials`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Authorization code (`authorization_code`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Redirect URI the code was delivered to (`authorization_code`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// PKCE code verifier (`authorization_code`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
}

/// Token Response.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenResponse {
    /// Encrypted access token.
    pub access_token: String,

    /// Lifetime of the access token, in seconds.
    pub expires_in: u64,

    /// Always `bearer`.
    pub token_type: TokenType,
}

/// Access token type.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum TokenType {
    /// Bearer token.
    #[default]
    #[serde(rename = "bearer")]
    Bearer,
}

/// Nonce Response.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NonceResponse {
    /// A fresh `c_nonce` for holder binding proofs.
    pub c_nonce: String,
}

/// Credential Request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialRequest {
    /// Single requested credential configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_configuration_id: Option<String>,

    /// Requested credential configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_configuration_ids: Option<Vec<String>>,

    /// Holder binding proofs keyed by proof type (`jwt`, `attestation`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proofs: Option<BTreeMap<String, Vec<String>>>,

    /// A single holder binding proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<SingleProof>,
}

impl CredentialRequest {
    /// Requested configuration ids, in request order, without duplicates.
    #[must_use]
    pub fn configuration_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = vec![];
        let requested = self
            .credential_configuration_id
            .iter()
            .chain(self.credential_configuration_ids.iter().flatten());
        for id in requested {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// Submitted proofs as a proof-type map. A single `proof` counts as a
    /// one-element list of its type.
    #[must_use]
    pub fn proof_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut proofs = self.proofs.clone().unwrap_or_default();
        if let Some(proof) = &self.proof {
            let value = match proof.proof_type.as_str() {
                "jwt" => proof.jwt.clone(),
                "attestation" => proof.attestation.clone(),
                _ => None,
            };
            proofs.entry(proof.proof_type.clone()).or_default().push(value.unwrap_or_default());
        }
        proofs
    }
}

/// A single holder binding proof.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SingleProof {
    /// `jwt` or `attestation`.
    pub proof_type: String,

    /// JWT proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,

    /// Attestation proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
}

/// Credential Response.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialResponse {
    /// Issued credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Vec<IssuedCredential>>,

    /// Deferred issuance handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Seconds the Wallet should wait before polling the deferred endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

/// An issued credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssuedCredential {
    /// Compact SD-JWT.
    pub credential: String,
}

/// Deferred Credential Request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeferredCredentialRequest {
    /// Handle returned by the credential endpoint.
    pub transaction_id: String,
}

/// Credential Offer Request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialOfferRequest {
    /// Scope of the offered credentials.
    pub scope: String,
}

/// Credential Offer Response.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialOfferResponse {
    /// Wallet URL carrying the offer in its `credential_offer` parameter.
    pub credential_offer_url: String,

    /// QR code of the offer, addressed to `openid-credential-offer://`.
    pub credential_offer_qrcode: String,
}

/// Credential Offer sent to the Wallet.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialOffer {
    /// Credential issuer URL.
    pub credential_issuer: String,

    /// Offered credential configurations.
    pub credential_configuration_ids: Vec<String>,

    /// Grants the Wallet may use.
    pub grants: Grants,
}

/// Grants available for a credential offer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Grants {
    /// Authorization code grant.
    pub authorization_code: AuthorizationCodeGrant,
}

/// Authorization code grant parameters.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationCodeGrant {
    /// Issuer state to include in the pushed authorization request.
    pub issuer_state: String,
}

/// OAuth 2.0 Authorization Server Metadata ([RFC8414]).
///
/// [RFC8414]: https://www.rfc-editor.org/rfc/rfc8414
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerMetadata {
    /// Authorization server issuer identifier.
    pub issuer: String,

    /// Authorization endpoint.
    pub authorization_endpoint: String,

    /// Token endpoint.
    pub token_endpoint: String,

    /// Pushed authorization request endpoint.
    pub pushed_authorization_request_endpoint: String,

    /// Supported grant types.
    pub grant_types_supported: Vec<String>,

    /// Supported response types.
    pub response_types_supported: Vec<String>,

    /// Supported PKCE methods.
    pub code_challenge_methods_supported: Vec<String>,

    /// Algorithms accepted for DPoP proofs.
    pub dpop_signing_alg_values_supported: Vec<String>,

    /// Scopes clients may request.
    pub scopes_supported: Vec<String>,
}

/// Credential Issuer Metadata.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssuerMetadata {
    /// Credential issuer identifier.
    pub credential_issuer: String,

    /// Authorization servers.
    pub authorization_servers: Vec<String>,

    /// Credential endpoint.
    pub credential_endpoint: String,

    /// Nonce endpoint.
    pub nonce_endpoint: String,

    /// Deferred credential endpoint.
    pub deferred_credential_endpoint: String,

    /// Supported credential configurations, keyed by id.
    pub credential_configurations_supported: Map<String, Value>,

    /// The metadata above as a compact JWS, `x5c` in its header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_metadata: Option<String>,
}
