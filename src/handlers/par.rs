//! # Pushed Authorization Request Endpoint
//!
//! The Pushed Authorization Request ([RFC9126]) endpoint lets a client push
//! its authorization request parameters directly to the authorization
//! server. The parameters are sealed in an encrypted `request_uri` the client
//! then presents at the authorization endpoint.
//!
//! A pushed request must carry the `issuer_state` from a credential offer,
//! showing the request originates from an offer made by this issuer.
//!
//! [RFC9126]: https://www.rfc-editor.org/rfc/rfc9126

use tracing::instrument;

use crate::codec::artifact::REQUEST_URI_PREFIX;
use crate::codec::AuthorizationRequest;
use crate::config::{ClientsConfig, TokenConfig};
use crate::error::invalid;
use crate::handlers::{encode_error, verify_issuer_state};
use crate::types::{ParRequest, ParResponse};
use crate::{scope, Result};

/// PKCE methods accepted in a code challenge.
pub(crate) const CODE_CHALLENGE_METHODS: [&str; 2] = ["S256", "plain"];

/// Pushed authorization request handler.
///
/// # Errors
///
/// Returns `invalid_request` for a malformed request, scope or issuer state,
/// and `invalid_client` when the client or redirect URI is not registered.
#[instrument(level = "debug", skip(config))]
pub fn par(config: &(impl ClientsConfig + TokenConfig), request: ParRequest) -> Result<ParResponse> {
    let authorization_request = verify(config, request)?;
    process(config, &authorization_request)
}

fn verify(
    config: &(impl ClientsConfig + TokenConfig), request: ParRequest,
) -> Result<AuthorizationRequest> {
    tracing::debug!("par::verify");

    if request.response_type.as_deref() != Some("code") {
        return Err(invalid!("response_type must be code"));
    }
    let Some(client_id) = request.client_id else {
        return Err(invalid!("client_id is missing"));
    };
    let Some(redirect_uri) = request.redirect_uri else {
        return Err(invalid!("redirect_uri is missing"));
    };

    let client = config.clients().validate_public(&client_id, &redirect_uri)?;
    let scope = scope::validate(request.scope.as_deref(), client)?;

    if let Some(challenge) = &request.code_challenge {
        if challenge.is_empty() {
            return Err(invalid!("code_challenge is invalid"));
        }
        let method = request.code_challenge_method.as_deref().unwrap_or("plain");
        if !CODE_CHALLENGE_METHODS.contains(&method) {
            return Err(invalid!("code_challenge_method is not supported"));
        }
    }

    verify_issuer_state(request.issuer_state.as_deref(), config)?;

    Ok(AuthorizationRequest {
        response_type: "code".into(),
        client_id,
        redirect_uri,
        scope: (!scope.is_empty()).then_some(scope),
        state: request.state,
        code_challenge: request.code_challenge,
        code_challenge_method: request.code_challenge_method,
        issuer_state: request.issuer_state,
    })
}

fn process(
    config: &(impl ClientsConfig + TokenConfig), request: &AuthorizationRequest,
) -> Result<ParResponse> {
    tracing::debug!("par::process");

    let expires_in = config.ttl().request_uri;
    let token = config.codec().encode(request, expires_in).map_err(|e| encode_error(&e))?;

    Ok(ParResponse {
        request_uri: format!("{REQUEST_URI_PREFIX}{token}"),
        expires_in,
    })
}
