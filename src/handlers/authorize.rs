//! # Authorization Endpoint
//!
//! The Wallet redirects the resource owner here with the `request_uri`
//! returned by the PAR endpoint. Until the host has authenticated the
//! resource owner, the handler returns the decoded request so the host can
//! render a login page. Once authenticated, it issues an authorization code
//! and redirects back to the client.
//!
//! The pushed request is re-validated in full: the client and scopes may
//! have changed since it was pushed.

use tracing::instrument;
use url::Url;

use crate::codec::artifact::REQUEST_URI_PREFIX;
use crate::codec::{AuthorizationCode, AuthorizationRequest};
use crate::config::{ClientsConfig, TokenConfig};
use crate::error::{client, invalid};
use crate::handlers::{encode_error, verify_issuer_state};
use crate::types::{AuthorizeRequest, AuthorizeResponse, ResourceOwner};
use crate::{scope, Result};

/// Authorization request handler.
///
/// # Errors
///
/// Returns `invalid_request` for an invalid `request_uri`, scope or issuer
/// state, and `invalid_client` when the request was pushed by another client
/// or the client is no longer registered.
#[instrument(level = "debug", skip(config))]
pub fn authorize(
    config: &(impl ClientsConfig + TokenConfig), request: AuthorizeRequest,
) -> Result<AuthorizeResponse> {
    let pushed = verify(config, &request)?;
    let Some(owner) = request.resource_owner else {
        tracing::debug!("authorize::login");
        return Ok(AuthorizeResponse::Login(pushed));
    };
    process(config, pushed, &owner)
}

fn verify(
    config: &(impl ClientsConfig + TokenConfig), request: &AuthorizeRequest,
) -> Result<AuthorizationRequest> {
    tracing::debug!("authorize::verify");

    let Some(token) = request.request_uri.strip_prefix(REQUEST_URI_PREFIX) else {
        return Err(invalid!("request_uri is invalid"));
    };
    let pushed = config
        .codec()
        .decode::<AuthorizationRequest>(token)
        .map_err(|e| invalid!("request_uri is invalid: {e}"))?;

    if pushed.client_id != request.client_id {
        return Err(client!("request_uri was issued to another client"));
    }

    let client = config.clients().validate_public(&pushed.client_id, &pushed.redirect_uri)?;
    scope::validate(pushed.scope.as_deref(), client)?;
    verify_issuer_state(pushed.issuer_state.as_deref(), config)?;

    Ok(pushed)
}

fn process(
    config: &(impl ClientsConfig + TokenConfig), pushed: AuthorizationRequest,
    owner: &ResourceOwner,
) -> Result<AuthorizeResponse> {
    tracing::debug!("authorize::process");

    if owner.sub.is_empty() {
        return Err(invalid!("resource owner is invalid"));
    }

    let Ok(mut redirect) = Url::parse(&pushed.redirect_uri) else {
        return Err(invalid!("redirect_uri is invalid"));
    };

    let code = AuthorizationCode {
        client_id: pushed.client_id,
        redirect_uri: pushed.redirect_uri,
        code_challenge: pushed.code_challenge,
        code_challenge_method: pushed.code_challenge_method,
        sub: owner.sub.clone(),
        scope: pushed.scope.unwrap_or_default(),
    };
    let code = config
        .codec()
        .encode(&code, config.ttl().authorization_code)
        .map_err(|e| encode_error(&e))?;

    {
        let mut query = redirect.query_pairs_mut();
        query.append_pair("code", &code);
        if let Some(state) = &pushed.state {
            query.append_pair("state", state);
        }
    }

    Ok(AuthorizeResponse::Redirect(redirect.to_string()))
}
