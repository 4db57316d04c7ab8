//! # Nonce Endpoint
//!
//! Issues a fresh `c_nonce` for holder binding proofs. The nonce is an
//! encrypted artifact naming the issuer client as its subject, so any
//! instance sharing the secret ring can verify it.

use tracing::instrument;

use crate::codec::Nonce;
use crate::config::{ClientsConfig, TokenConfig};
use crate::handlers::encode_error;
use crate::types::NonceResponse;
use crate::Result;

/// Nonce request handler.
///
/// # Errors
///
/// Returns `unknown_error` if the nonce cannot be encrypted.
#[instrument(level = "debug", skip(config))]
pub fn nonce(config: &(impl ClientsConfig + TokenConfig)) -> Result<NonceResponse> {
    tracing::debug!("nonce::process");

    let nonce = Nonce {
        sub: config.clients().issuer().id.clone(),
    };
    let c_nonce =
        config.codec().encode(&nonce, config.ttl().access_token).map_err(|e| encode_error(&e))?;

    Ok(NonceResponse { c_nonce })
}
