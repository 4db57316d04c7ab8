//! A stateless OAuth 2.0 authorization server for the issuance of Verifiable
//! Credentials based on the [OpenID for Verifiable Credential Issuance]
//! specification.
//!
//! # Design
//!
//! **Stateless artifacts**
//!
//! The server keeps no per-request state. Every artifact it hands out (pushed
//! request URIs, authorization codes, access tokens, nonces, issuer state and
//! deferred transactions) is an encrypted, typed, self-expiring token sealed
//! with a secret from a shared, optionally rotating, secret ring. Any
//! instance configured with the same secrets can redeem any artifact.
//!
//! **Endpoints**
//!
//! The library is architected around the endpoints, each with its own
//! `XxxRequest` and `XxxResponse` types. The types serialize to and from
//! JSON. HTTP transport is left to the host: the endpoints are methods on
//! [`Issuer`], and HTTP details needed to authenticate credential requests
//! travel in [`types::HttpContext`].
//!
//! Implementors provide the subject claims and QR code rendering through the
//! [`provider::Provider`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! let issuer = Issuer::new(config, Provider::new())?;
//! let rotation = issuer.start_rotation();
//!
//! let router = Router::new()
//!     .route("/token", post(token))
//!     // --- other routes ---
//!     .with_state(Arc::new(issuer));
//!
//! async fn token(
//!     State(issuer): State<Arc<Issuer<Provider>>>, Form(req): Form<TokenRequest>,
//! ) -> AxResult<TokenResponse> {
//!     issuer.token(req).into()
//! }
//! ```
//!
//! [OpenID for Verifiable Credential Issuance]: (https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0.html)

pub mod catalog;
pub mod client;
pub mod codec;
pub mod config;
pub mod dpop;
pub mod error;
pub mod handlers;
pub mod jose;
pub mod proof;
pub mod provider;
pub mod scope;
pub mod sd_jwt;
pub mod types;

use std::sync::Arc;

use serde_json::Value;

pub use crate::codec::RotationHandle;
pub use crate::config::{Config, ConfigError, Settings};
use crate::config::TokenConfig;
pub use crate::error::{Error, ErrorResponse};
use crate::provider::Provider;
use crate::types::{
    AuthorizeRequest, AuthorizeResponse, CredentialOfferRequest, CredentialOfferResponse,
    CredentialRequest, CredentialResponse, DeferredCredentialRequest, HttpContext, IssuerMetadata,
    NonceResponse, ParRequest, ParResponse, ServerMetadata, TokenRequest, TokenResponse,
};

/// Result type for the issuing engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Result of an endpoint: the response, or the error to return to the caller.
pub type Response<T> = std::result::Result<T, ErrorResponse>;

/// The issuer's endpoints.
///
/// Cheap to clone: settings are shared.
#[derive(Clone)]
pub struct Issuer<P: Provider> {
    settings: Arc<Settings>,
    provider: P,
}

impl<P: Provider> Issuer<P> {
    /// Validate `config` and create an issuer backed by `provider`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for invalid configuration.
    pub fn new(config: Config, provider: P) -> Result<Self, ConfigError> {
        let settings = config.validate()?;
        tracing::info!(rotation = settings.rotation().is_some(), "issuer configured");
        Ok(Self {
            settings: Arc::new(settings),
            provider,
        })
    }

    /// The validated settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start the secret rotation task when rotation is enabled. Must be
    /// called from within a tokio runtime.
    ///
    /// Returns `None` when rotation is disabled or already running for these
    /// settings, including from a clone of this issuer. Rotation stops when
    /// the returned handle is stopped.
    #[must_use]
    pub fn start_rotation(&self) -> Option<RotationHandle> {
        let rotation = self.settings.rotation()?;
        codec::rotation::spawn(
            Arc::clone(self.settings.codec().secrets()),
            rotation.base_secret.clone(),
            rotation.ttl,
            rotation.counter,
        )
    }

    /// Pushed authorization request endpoint.
    ///
    /// # Errors
    ///
    /// See [`handlers::par::par`].
    pub fn par(&self, request: ParRequest) -> Response<ParResponse> {
        let client_id = request.client_id.clone().unwrap_or_default();
        handlers::par::par(self.settings.as_ref(), request)
            .map_err(|e| report("par", e.to_response().with_data("client_id", client_id)))
    }

    /// Authorization endpoint.
    ///
    /// # Errors
    ///
    /// See [`handlers::authorize::authorize`].
    pub fn authorize(&self, request: AuthorizeRequest) -> Response<AuthorizeResponse> {
        let client_id = request.client_id.clone();
        handlers::authorize::authorize(self.settings.as_ref(), request)
            .map_err(|e| report("authorize", e.to_response().with_data("client_id", client_id)))
    }

    /// Token endpoint.
    ///
    /// # Errors
    ///
    /// See [`handlers::token::token`].
    pub fn token(&self, request: TokenRequest) -> Response<TokenResponse> {
        let client_id = request.client_id.clone().unwrap_or_default();
        let grant_type = request.grant_type.clone();
        handlers::token::token(self.settings.as_ref(), request).map_err(|e| {
            let resp = e.to_response().with_data("client_id", client_id);
            report("token", resp.with_data("grant_type", grant_type))
        })
    }

    /// Nonce endpoint.
    ///
    /// # Errors
    ///
    /// See [`handlers::nonce::nonce`].
    pub fn nonce(&self) -> Response<NonceResponse> {
        handlers::nonce::nonce(self.settings.as_ref()).map_err(|e| report("nonce", e.to_response()))
    }

    /// Credential endpoint.
    ///
    /// # Errors
    ///
    /// See [`handlers::credential::credential`].
    pub async fn credential(
        &self, http: &HttpContext, request: CredentialRequest,
    ) -> Response<CredentialResponse> {
        let ids = request.configuration_ids();
        handlers::credential::credential(&self.settings, &self.provider, http, request).await.map_err(
            |e| report("credential", e.to_response().with_data("credential_configuration_ids", ids)),
        )
    }

    /// Deferred credential endpoint.
    ///
    /// # Errors
    ///
    /// See [`handlers::deferred::deferred`].
    pub async fn deferred_credential(
        &self, http: &HttpContext, request: DeferredCredentialRequest,
    ) -> Response<CredentialResponse> {
        handlers::deferred::deferred(&self.settings, &self.provider, http, request)
            .await
            .map_err(|e| report("deferred", e.to_response()))
    }

    /// Credential offer endpoint.
    ///
    /// # Errors
    ///
    /// See [`handlers::offer::offer`].
    pub async fn credential_offer(
        &self, request: CredentialOfferRequest,
    ) -> Response<CredentialOfferResponse> {
        let scope = request.scope.clone();
        handlers::offer::offer(self.settings.as_ref(), &self.provider, request)
            .await
            .map_err(|e| report("credential_offer", e.to_response().with_data("scope", scope)))
    }

    /// Authorization server metadata endpoint.
    #[must_use]
    pub fn server_metadata(&self) -> ServerMetadata {
        handlers::metadata::server_metadata(self.settings.as_ref())
    }

    /// Credential issuer metadata endpoint.
    ///
    /// # Errors
    ///
    /// See [`handlers::metadata::issuer_metadata`].
    pub fn issuer_metadata(&self) -> Response<IssuerMetadata> {
        handlers::metadata::issuer_metadata(self.settings.as_ref())
            .map_err(|e| report("issuer_metadata", e.to_response()))
    }
}

// Log a failed request as a business event before returning it.
fn report(endpoint: &str, resp: ErrorResponse) -> ErrorResponse {
    let data = Value::Object(resp.data.clone());
    tracing::warn!(
        endpoint,
        status = resp.status,
        error = %resp.error,
        description = %resp.error_description,
        data = %data,
        "request failed"
    );
    resp
}
