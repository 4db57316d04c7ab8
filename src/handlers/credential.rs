//! # Credential Endpoint
//!
//! The Wallet presents its access token, a DPoP proof and holder binding
//! proofs, and receives one SD-JWT per requested credential configuration
//! and proven key.
//!
//! Requested configurations the access token does not cover are dropped
//! rather than rejected. Configurations issued through the deferred endpoint,
//! or whose claims are still pending, are sealed into a transaction the
//! Wallet polls with.

use tracing::instrument;

use crate::catalog::CredentialConfiguration;
use crate::codec::{AccessToken, Transaction};
use crate::config::{CatalogConfig, ClientsConfig, Settings, TokenConfig};
use crate::error::{client, invalid, server};
use crate::handlers::{encode_error, verify_access};
use crate::jose::PublicKeyJwk;
use crate::provider::Provider;
use crate::types::{CredentialRequest, CredentialResponse, HttpContext, IssuedCredential};
use crate::{proof, scope, sd_jwt, Result};

struct Context<'a> {
    access: AccessToken,
    configurations: Vec<&'a CredentialConfiguration>,
    holder_keys: Vec<PublicKeyJwk>,
}

/// Credential request handler.
///
/// # Errors
///
/// Returns `invalid_request` for a missing or invalid access token, DPoP
/// proof or holder binding proof, `invalid_client` when the token's client is
/// unknown, and `unknown_error` when claims cannot be fetched or the
/// credential cannot be signed.
#[instrument(level = "debug", skip(settings, provider, http))]
pub async fn credential(
    settings: &Settings, provider: &impl Provider, http: &HttpContext, request: CredentialRequest,
) -> Result<CredentialResponse> {
    let access = verify_access(http, settings)?;
    let ctx = verify(settings, access, &request)?;
    if ctx.configurations.is_empty() {
        tracing::debug!("credential::nothing_to_issue");
        return Ok(CredentialResponse {
            credentials: Some(vec![]),
            ..CredentialResponse::default()
        });
    }
    process(settings, provider, ctx).await
}

fn verify<'a>(
    settings: &'a Settings, access: AccessToken, request: &CredentialRequest,
) -> Result<Context<'a>> {
    tracing::debug!("credential::verify");

    let Some(client) = settings.clients().find(&access.client_id) else {
        return Err(client!("client is invalid"));
    };

    let ids = request.configuration_ids();
    if ids.is_empty() {
        return Err(invalid!("credential_configuration_id is missing"));
    }

    let configurations = ids
        .iter()
        .filter_map(|id| settings.catalog().get(id))
        .filter(|c| client.allows_scope(&c.scope) && scope::contains(&access.scope, &c.scope))
        .collect::<Vec<_>>();
    if configurations.is_empty() {
        return Ok(Context {
            access,
            configurations,
            holder_keys: vec![],
        });
    }

    let holder_keys = proof::verify(&request.proof_map(), settings)?;
    if holder_keys.is_empty() {
        return Err(invalid!("proof is missing"));
    }

    Ok(Context {
        access,
        configurations,
        holder_keys,
    })
}

async fn process(
    settings: &Settings, provider: &impl Provider, ctx: Context<'_>,
) -> Result<CredentialResponse> {
    tracing::debug!("credential::process");

    let mut credentials = vec![];
    let mut deferred = vec![];

    for configuration in ctx.configurations {
        if configuration.deferred {
            deferred.push(configuration.credential_configuration_id.clone());
            continue;
        }

        let dataset = provider
            .dataset(&ctx.access.sub, configuration)
            .await
            .map_err(|e| {
                tracing::error!("issue populating claims: {e}");
                server!("issue populating claims")
            })?;
        if dataset.pending {
            deferred.push(configuration.credential_configuration_id.clone());
            continue;
        }

        for key in &ctx.holder_keys {
            let credential = sd_jwt::mint(&dataset.claims, configuration, key, settings)?;
            credentials.push(IssuedCredential { credential });
        }
    }

    if deferred.is_empty() {
        return Ok(CredentialResponse {
            credentials: Some(credentials),
            ..CredentialResponse::default()
        });
    }

    tracing::debug!("credential::deferred");
    let transaction = Transaction {
        sub: ctx.access.sub,
        client_id: ctx.access.client_id,
        credential_configuration_ids: deferred,
        holder_keys: ctx.holder_keys,
    };
    let transaction_id = settings
        .codec()
        .encode(&transaction, settings.ttl().access_token)
        .map_err(|e| encode_error(&e))?;

    Ok(CredentialResponse {
        credentials: (!credentials.is_empty()).then_some(credentials),
        transaction_id: Some(transaction_id),
        interval: Some(settings.ttl().deferred_interval),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_let_bind::assert_let;
    use p256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    use super::*;
    use crate::handlers::testing::{access_token, c_nonce, http, jwt_proof, settings, TestProvider};
    use crate::jose::jws::Jws;
    use crate::sd_jwt::SdJwtClaims;
    use crate::Error;

    fn request(settings: &Settings, ids: &[&str], holders: &[&SigningKey]) -> CredentialRequest {
        let nonce = c_nonce(settings);
        let proofs = holders.iter().map(|h| jwt_proof(h, &nonce)).collect();
        CredentialRequest {
            credential_configuration_ids: Some(ids.iter().map(ToString::to_string).collect()),
            proofs: Some(BTreeMap::from([("jwt".to_string(), proofs)])),
            ..CredentialRequest::default()
        }
    }

    #[tokio::test]
    async fn one_per_key() {
        let settings = settings();
        let holder = SigningKey::random(&mut OsRng);
        let other = SigningKey::random(&mut OsRng);
        let token = access_token(&settings, "wallet", "identity");
        let request = request(&settings, &["Identity_SD_JWT"], &[&holder, &other]);

        let response = credential(&settings, &TestProvider::default(), &http(&holder, &token), request)
            .await
            .expect("should issue");
        assert!(response.transaction_id.is_none());

        let credentials = response.credentials.expect("credentials");
        assert_eq!(credentials.len(), 2);

        let jwt = credentials[1].credential.split('~').next().expect("jwt");
        let claims = Jws::<SdJwtClaims>::decode(jwt).expect("should decode").claims;
        assert_eq!(claims.cnf.jwk, PublicKeyJwk::from(other.verifying_key()));
        assert_eq!(claims.vct.as_deref(), Some("Identity"));
    }

    #[tokio::test]
    async fn unauthorized_ids_filtered() {
        let settings = settings();
        let holder = SigningKey::random(&mut OsRng);
        let token = access_token(&settings, "wallet", "identity");
        let mut request = request(&settings, &["Employment_SD_JWT", "Unknown"], &[&holder]);
        request.proofs = None;

        let response = credential(&settings, &TestProvider::default(), &http(&holder, &token), request)
            .await
            .expect("should respond");
        assert_eq!(response.credentials, Some(vec![]));
        assert!(response.transaction_id.is_none());
    }

    #[tokio::test]
    async fn deferred_configuration() {
        let settings = settings();
        let holder = SigningKey::random(&mut OsRng);
        let token = access_token(&settings, "wallet", "identity employment");
        let request = request(&settings, &["Identity_SD_JWT", "Employment_SD_JWT"], &[&holder]);

        let response = credential(&settings, &TestProvider::default(), &http(&holder, &token), request)
            .await
            .expect("should respond");
        assert_eq!(response.credentials.map(|c| c.len()), Some(1));
        assert_eq!(response.interval, Some(5));

        let transaction_id = response.transaction_id.expect("transaction");
        let transaction = settings.codec().decode::<Transaction>(&transaction_id).expect("decode");
        assert_eq!(transaction.credential_configuration_ids, vec!["Employment_SD_JWT"]);
        assert_eq!(transaction.holder_keys, vec![PublicKeyJwk::from(holder.verifying_key())]);
        assert_eq!(transaction.client_id, "wallet");
    }

    #[tokio::test]
    async fn missing_proof() {
        let settings = settings();
        let holder = SigningKey::random(&mut OsRng);
        let token = access_token(&settings, "wallet", "identity");
        let mut request = request(&settings, &["Identity_SD_JWT"], &[&holder]);
        request.proofs = None;

        let result =
            credential(&settings, &TestProvider::default(), &http(&holder, &token), request).await;
        assert_let!(Err(Error::InvalidRequest(desc)), result);
        assert_eq!(desc, "proof is missing");
    }

    #[tokio::test]
    async fn missing_dpop() {
        let settings = settings();
        let holder = SigningKey::random(&mut OsRng);
        let token = access_token(&settings, "wallet", "identity");
        let request = request(&settings, &["Identity_SD_JWT"], &[&holder]);
        let mut http = http(&holder, &token);
        http.dpop.clear();

        let result = credential(&settings, &TestProvider::default(), &http, request).await;
        assert_let!(Err(Error::InvalidRequest(desc)), result);
        assert_eq!(desc, "dpop jwt is missing");
    }
}
