//! # Deferred Credential Endpoint
//!
//! The Wallet polls here with the `transaction_id` returned by the credential
//! endpoint. Credentials are issued for the keys proven in the original
//! request once the subject's claims are no longer pending.

use tracing::instrument;

use crate::codec::Transaction;
use crate::config::{CatalogConfig, Settings, TokenConfig};
use crate::error::server;
use crate::handlers::verify_access;
use crate::provider::Provider;
use crate::types::{CredentialResponse, DeferredCredentialRequest, HttpContext, IssuedCredential};
use crate::{sd_jwt, Error, Result};

/// Deferred credential request handler.
///
/// # Errors
///
/// Returns `invalid_transaction_id` for a transaction that cannot be decoded
/// or belongs to another client or subject, and `issuance_pending` while the
/// subject's claims are pending.
#[instrument(level = "debug", skip(settings, provider, http))]
pub async fn deferred(
    settings: &Settings, provider: &impl Provider, http: &HttpContext,
    request: DeferredCredentialRequest,
) -> Result<CredentialResponse> {
    let access = verify_access(http, settings)?;

    tracing::debug!("deferred::verify");
    let Ok(transaction) = settings.codec().decode::<Transaction>(&request.transaction_id) else {
        return Err(Error::InvalidTransactionId("transaction_id is invalid".into()));
    };
    if transaction.client_id != access.client_id || transaction.sub != access.sub {
        return Err(Error::InvalidTransactionId("transaction_id is invalid".into()));
    }

    tracing::debug!("deferred::process");
    let mut credentials = vec![];
    for id in &transaction.credential_configuration_ids {
        let Some(configuration) = settings.catalog().get(id) else {
            continue;
        };
        let dataset = provider
            .dataset(&transaction.sub, configuration)
            .await
            .map_err(|e| {
                tracing::error!("issue populating claims: {e}");
                server!("issue populating claims")
            })?;
        if dataset.pending {
            return Err(Error::IssuancePending("issuance is pending".into()));
        }
        for key in &transaction.holder_keys {
            let credential = sd_jwt::mint(&dataset.claims, configuration, key, settings)?;
            credentials.push(IssuedCredential { credential });
        }
    }

    Ok(CredentialResponse {
        credentials: Some(credentials),
        ..CredentialResponse::default()
    })
}
