//! # Credential Offer Endpoint
//!
//! Builds an issuer-initiated credential offer for the configurations covered
//! by a scope. The offer carries an `issuer_state` the Wallet must return in
//! its pushed authorization request, and is delivered both as a Wallet URL
//! and as a QR code addressed to the `openid-credential-offer://` scheme.

use tracing::instrument;

use crate::codec::IssuerState;
use crate::config::{CatalogConfig, ClientsConfig, IssuerConfig, TokenConfig};
use crate::error::server;
use crate::handlers::encode_error;
use crate::provider::Render;
use crate::types::{
    AuthorizationCodeGrant, CredentialOffer, CredentialOfferRequest, CredentialOfferResponse,
    Grants,
};
use crate::{scope, Error, Result};

/// URL scheme Wallets register for credential offers.
pub const OFFER_SCHEME: &str = "openid-credential-offer://";

/// Credential offer request handler.
///
/// # Errors
///
/// Returns `invalid_request` when the issuer client may not offer the scope,
/// `invalid_credential` when no configuration matches it, and
/// `unknown_error` when the offer cannot be encoded or rendered.
#[instrument(level = "debug", skip(config, provider))]
pub async fn offer(
    config: &(impl ClientsConfig + TokenConfig + CatalogConfig + IssuerConfig),
    provider: &impl Render, request: CredentialOfferRequest,
) -> Result<CredentialOfferResponse> {
    tracing::debug!("offer::verify");

    let issuer = config.clients().issuer();
    let scope = scope::validate(Some(&request.scope), issuer)?;

    let mut credential_configuration_ids = vec![];
    for s in scope::split(&scope) {
        for configuration in config.catalog().by_scope(s) {
            credential_configuration_ids.push(configuration.credential_configuration_id.clone());
        }
    }
    if credential_configuration_ids.is_empty() {
        return Err(Error::InvalidCredential("no credential configuration for scope".into()));
    }

    tracing::debug!("offer::process");

    let state = IssuerState {
        sub: issuer.id.clone(),
    };
    let issuer_state =
        config.codec().encode(&state, config.ttl().issuer_state).map_err(|e| encode_error(&e))?;

    let offer = CredentialOffer {
        credential_issuer: config.issuer_url().to_string(),
        credential_configuration_ids,
        grants: Grants {
            authorization_code: AuthorizationCodeGrant { issuer_state },
        },
    };
    let json = serde_json::to_string(&offer).map_err(|e| server!("issue serializing offer: {e}"))?;
    let query = format!("?credential_offer={}", urlencoding::encode(&json));

    let credential_offer_qrcode = provider
        .qrcode(&format!("{OFFER_SCHEME}{query}"))
        .await
        .map_err(|e| {
            tracing::error!("issue rendering qrcode: {e}");
            server!("issue rendering qrcode")
        })?;

    Ok(CredentialOfferResponse {
        credential_offer_url: format!("{}{query}", config.wallet_url()),
        credential_offer_qrcode,
    })
}
