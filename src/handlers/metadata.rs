//! # Metadata Endpoints
//!
//! Authorization server metadata ([RFC8414]) and credential issuer metadata.
//! Issuer metadata is also published signed, as a JWS carrying the signing
//! key's certificate chain in its `x5c` header.
//!
//! [RFC8414]: https://www.rfc-editor.org/rfc/rfc8414

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::config::{CatalogConfig, IssuerConfig, SigningConfig};
use crate::error::server;
use crate::handlers::par::CODE_CHALLENGE_METHODS;
use crate::jose::jws::{self, Header};
use crate::jose::Algorithm;
use crate::types::{IssuerMetadata, ServerMetadata};
use crate::Result;

/// Authorization server metadata handler.
#[instrument(level = "debug", skip(config))]
pub fn server_metadata(config: &(impl IssuerConfig + CatalogConfig)) -> ServerMetadata {
    tracing::debug!("metadata::server");

    let issuer = config.issuer_url();

    let mut scopes_supported: Vec<String> = vec![];
    for configuration in config.catalog().iter() {
        if !scopes_supported.contains(&configuration.scope) {
            scopes_supported.push(configuration.scope.clone());
        }
    }

    let algs = [
        Algorithm::ES256,
        Algorithm::ES384,
        Algorithm::EdDSA,
        Algorithm::RS256,
        Algorithm::RS384,
        Algorithm::RS512,
    ];

    ServerMetadata {
        issuer: issuer.to_string(),
        authorization_endpoint: format!("{issuer}/authorize"),
        token_endpoint: format!("{issuer}/token"),
        pushed_authorization_request_endpoint: format!("{issuer}/pushed-authorization-request"),
        grant_types_supported: vec!["authorization_code".into(), "client_credentials".into()],
        response_types_supported: vec!["code".into()],
        code_challenge_methods_supported: CODE_CHALLENGE_METHODS.map(String::from).to_vec(),
        dpop_signing_alg_values_supported: algs.iter().map(ToString::to_string).collect(),
        scopes_supported,
    }
}

/// Credential issuer metadata handler.
///
/// # Errors
///
/// Returns `unknown_error` if the metadata cannot be serialized or signed.
#[instrument(level = "debug", skip(config))]
pub fn issuer_metadata(
    config: &(impl IssuerConfig + CatalogConfig + SigningConfig),
) -> Result<IssuerMetadata> {
    tracing::debug!("metadata::issuer");

    let issuer = config.issuer_url();

    let mut credential_configurations_supported = Map::new();
    for configuration in config.catalog().iter() {
        let Value::Object(mut entry) = serde_json::to_value(configuration)
            .map_err(|e| server!("issue serializing configuration: {e}"))?
        else {
            return Err(server!("credential configuration is not an object"));
        };
        entry.remove("credential_configuration_id");
        entry.remove("deferred");
        credential_configurations_supported
            .insert(configuration.credential_configuration_id.clone(), Value::Object(entry));
    }

    let mut metadata = IssuerMetadata {
        credential_issuer: issuer.to_string(),
        authorization_servers: vec![issuer.to_string()],
        credential_endpoint: format!("{issuer}/credential"),
        nonce_endpoint: format!("{issuer}/nonce"),
        deferred_credential_endpoint: format!("{issuer}/deferred_credential"),
        credential_configurations_supported,
        signed_metadata: None,
    };
    metadata.signed_metadata = Some(sign(&metadata, config)?);

    Ok(metadata)
}

fn sign(metadata: &IssuerMetadata, config: &(impl IssuerConfig + SigningConfig)) -> Result<String> {
    let Value::Object(mut claims) =
        serde_json::to_value(metadata).map_err(|e| server!("issue serializing metadata: {e}"))?
    else {
        return Err(server!("metadata is not an object"));
    };
    claims.insert("iss".into(), Value::String(config.issuer_url().to_string()));
    claims.insert("sub".into(), Value::String(config.issuer_url().to_string()));
    claims.insert("iat".into(), Value::from(Utc::now().timestamp()));

    let chain = config.certificate_chain();
    let header = Header {
        typ: Some("JWT".into()),
        x5c: (!chain.is_empty()).then(|| chain.to_vec()),
        ..Header::default()
    };
    jws::encode(header, &claims, config.signing_key())
        .map_err(|e| server!("issue signing metadata: {e}"))
}
