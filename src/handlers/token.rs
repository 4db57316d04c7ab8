//! # Token Endpoint
//!
//! Exchanges a grant for an encrypted access token. Two grants are
//! supported:
//!
//! - `client_credentials`: a confidential client authenticates with its
//!   secret and receives a token for itself, limited to the requested scopes.
//! - `authorization_code`: the client redeems a code issued by the
//!   authorization endpoint, proving possession of the PKCE verifier when the
//!   pushed request carried a challenge.

use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::instrument;

use crate::codec::{AccessToken, AuthorizationCode};
use crate::config::{ClientsConfig, TokenConfig};
use crate::error::{client, invalid};
use crate::handlers::encode_error;
use crate::types::{TokenRequest, TokenResponse, TokenType};
use crate::{scope, Result};

/// Token request handler.
///
/// # Errors
///
/// Returns `invalid_client` when the client cannot be authenticated or the
/// code was issued to another client or redirect URI, and `invalid_request`
/// for an unsupported grant, invalid scope, code or verifier.
#[instrument(level = "debug", skip(config, request), fields(grant_type = %request.grant_type))]
pub fn token(config: &(impl ClientsConfig + TokenConfig), request: TokenRequest) -> Result<TokenResponse> {
    let access_token = match request.grant_type.as_str() {
        "client_credentials" => client_credentials(config, &request)?,
        "authorization_code" => authorization_code(config, &request)?,
        _ => return Err(invalid!("grant type is not supported")),
    };
    process(config, &access_token)
}

fn authenticate<'a>(
    config: &'a impl ClientsConfig, request: &TokenRequest,
) -> Result<&'a crate::client::OauthClient> {
    let Some(client_id) = &request.client_id else {
        return Err(invalid!("client_id is missing"));
    };
    config.clients().validate_by_secret(client_id, request.client_secret.as_deref())
}

fn client_credentials(
    config: &(impl ClientsConfig + TokenConfig), request: &TokenRequest,
) -> Result<AccessToken> {
    tracing::debug!("token::client_credentials");

    let Some(client_id) = &request.client_id else {
        return Err(invalid!("client_id is missing"));
    };
    let client =
        config.clients().validate_confidential(client_id, request.client_secret.as_deref())?;
    let scope = scope::validate(request.scope.as_deref(), client)?;

    Ok(AccessToken {
        client_id: client.id.clone(),
        sub: client.id.clone(),
        scope,
        previous_code: None,
    })
}

fn authorization_code(
    config: &(impl ClientsConfig + TokenConfig), request: &TokenRequest,
) -> Result<AccessToken> {
    tracing::debug!("token::authorization_code");

    let client = authenticate(config, request)?;
    let Some(code) = &request.code else {
        return Err(invalid!("code is missing"));
    };
    let grant = config
        .codec()
        .decode::<AuthorizationCode>(code)
        .map_err(|e| invalid!("code is invalid: {e}"))?;

    if grant.client_id != client.id {
        return Err(client!("code was issued to another client"));
    }
    if request.redirect_uri.as_deref() != Some(grant.redirect_uri.as_str()) {
        return Err(client!("redirect_uri does not match"));
    }
    verify_pkce(&grant, request.code_verifier.as_deref())?;

    Ok(AccessToken {
        client_id: grant.client_id,
        sub: grant.sub,
        scope: grant.scope,
        previous_code: Some(Base64UrlUnpadded::encode_string(&Sha256::digest(code.as_bytes()))),
    })
}

fn verify_pkce(grant: &AuthorizationCode, verifier: Option<&str>) -> Result<()> {
    let Some(challenge) = &grant.code_challenge else {
        return Ok(());
    };
    let Some(verifier) = verifier else {
        return Err(invalid!("code_verifier is missing"));
    };

    let computed = match grant.code_challenge_method.as_deref() {
        Some("S256") => Base64UrlUnpadded::encode_string(&Sha256::digest(verifier.as_bytes())),
        Some("plain") | None => verifier.to_string(),
        Some(_) => return Err(invalid!("code_challenge_method is not supported")),
    };
    if !bool::from(computed.as_bytes().ct_eq(challenge.as_bytes())) {
        return Err(invalid!("code_verifier is invalid"));
    }
    Ok(())
}

fn process(config: &impl TokenConfig, access_token: &AccessToken) -> Result<TokenResponse> {
    tracing::debug!("token::process");

    let expires_in = config.ttl().access_token;
    let access_token =
        config.codec().encode(access_token, expires_in).map_err(|e| encode_error(&e))?;

    Ok(TokenResponse {
        access_token,
        expires_in,
        token_type: TokenType::Bearer,
    })
}
