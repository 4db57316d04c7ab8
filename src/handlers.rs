//! # Endpoint Handlers
//!
//! Each handler is a pipeline of small statements. A statement consumes typed
//! input and the configuration capability it needs, then returns a refined
//! value or a protocol [`Error`](crate::Error) that short-circuits the
//! pipeline.

pub mod authorize;
pub mod credential;
pub mod deferred;
pub mod metadata;
pub mod nonce;
pub mod offer;
pub mod par;
pub mod token;

use crate::codec::{AccessToken, CodecError, IssuerState};
use crate::config::{ClientsConfig, DpopConfig, TokenConfig};
use crate::dpop::{self, Binding};
use crate::error::{client, invalid, server};
use crate::types::HttpContext;
use crate::Result;

/// Check an issuer state token was minted by this issuer for its own client.
pub(crate) fn verify_issuer_state(
    issuer_state: Option<&str>, config: &(impl ClientsConfig + TokenConfig),
) -> Result<()> {
    let Some(issuer_state) = issuer_state else {
        return Err(invalid!("issuer state is missing"));
    };
    match config.codec().decode::<IssuerState>(issuer_state) {
        Ok(state) if state.sub == config.clients().issuer().id => Ok(()),
        _ => Err(invalid!("issuer state is invalid")),
    }
}

/// Authenticate a request to a credential endpoint: decode the access token
/// from the `Authorization` header and verify the DPoP proof bound to it.
pub(crate) fn verify_access(
    http: &HttpContext, config: &(impl ClientsConfig + TokenConfig + DpopConfig),
) -> Result<AccessToken> {
    tracing::debug!("handlers::verify_access");

    let Some(authorization) = &http.authorization else {
        return Err(invalid!("authorization header is missing"));
    };
    let Some((scheme, access_token)) = authorization.trim().split_once(' ') else {
        return Err(invalid!("authorization header is invalid"));
    };
    if !scheme.eq_ignore_ascii_case("dpop") && !scheme.eq_ignore_ascii_case("bearer") {
        return Err(invalid!("authorization header is invalid"));
    }
    let access_token = access_token.trim();

    let token = config
        .codec()
        .decode::<AccessToken>(access_token)
        .map_err(|e| client!("access token is invalid: {e}"))?;
    if config.clients().find(&token.client_id).is_none() {
        return Err(client!("client is invalid"));
    }

    let binding = Binding {
        method: &http.method,
        uri: &http.uri,
        access_token,
    };
    dpop::verify(&http.dpop, binding, config)?;

    Ok(token)
}

/// Map a failure to mint an artifact.
pub(crate) fn encode_error(e: &CodecError) -> crate::Error {
    server!("issue generating token: {e}")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::Utc;
    use p256::ecdsa::SigningKey;
    use rcgen::KeyPair;
    use serde_json::json;

    use crate::catalog::CredentialConfiguration;
    use crate::provider::{Dataset, Provider, Render, Subject};
    use crate::client::OauthClient;
    use crate::codec::{AccessToken, IssuerState, Nonce};
    use crate::config::{Config, SecretConfig, Settings, SigningKeyConfig, TokenConfig};
    use crate::dpop::{ath, DPOP_TYPE};
    use crate::jose::jws::{self, Header};
    use crate::jose::PublicKeyJwk;
    use crate::types::HttpContext;

    pub const WALLET_REDIRECT: &str = "https://wallet.example/callback";
    pub const CREDENTIAL_URI: &str = "https://issuer.example/credential";

    /// Serves a fixed claim set. Issuance stays pending while `pending` is set.
    #[derive(Clone, Default)]
    pub struct TestProvider {
        pub pending: Arc<AtomicBool>,
    }

    impl Provider for TestProvider {}

    impl Subject for TestProvider {
        async fn dataset(
            &self, subject_id: &str, configuration: &CredentialConfiguration,
        ) -> anyhow::Result<Dataset> {
            let claims = json!({
                "sub": subject_id,
                "given_name": "Alice",
                "family_name": "Holder",
                "credential": configuration.credential_configuration_id,
            });
            Ok(Dataset {
                claims: claims.as_object().cloned().unwrap_or_default(),
                pending: self.pending.load(Ordering::SeqCst),
            })
        }
    }

    impl Render for TestProvider {
        async fn qrcode(&self, data: &str) -> anyhow::Result<String> {
            Ok(format!("data:image/png;base64,{}", data.len()))
        }
    }

    pub fn config() -> Config {
        let key = KeyPair::generate().expect("should generate key");
        Config {
            issuer_url: "https://issuer.example".into(),
            wallet_url: "https://wallet.example/offer".into(),
            clients: vec![
                OauthClient {
                    id: "wallet".into(),
                    redirect_uris: vec![WALLET_REDIRECT.into()],
                    scopes: vec!["identity".into(), "employment".into()],
                    ..OauthClient::default()
                },
                OauthClient {
                    id: "backend".into(),
                    secret: Some("s3cr3t".into()),
                    scopes: vec!["identity".into()],
                    ..OauthClient::default()
                },
            ],
            issuer_client: OauthClient {
                id: "issuer".into(),
                scopes: vec!["identity".into(), "employment".into()],
                ..OauthClient::default()
            },
            credential_configurations: vec![
                CredentialConfiguration {
                    credential_configuration_id: "Identity_SD_JWT".into(),
                    scope: "identity".into(),
                    format: "vc+sd-jwt".into(),
                    vct: Some("Identity".into()),
                    ..CredentialConfiguration::default()
                },
                CredentialConfiguration {
                    credential_configuration_id: "Employment_SD_JWT".into(),
                    scope: "employment".into(),
                    format: "vc+sd-jwt".into(),
                    vct: Some("Employment".into()),
                    deferred: true,
                    ..CredentialConfiguration::default()
                },
            ],
            secret: SecretConfig {
                secret: "test-secret".into(),
                ..SecretConfig::default()
            },
            signing: SigningKeyConfig {
                key_pem: key.serialize_pem(),
                certificate_chain: vec![],
            },
            ..Config::default()
        }
    }

    pub fn settings() -> Settings {
        config().validate().expect("should validate")
    }

    pub fn issuer_state(settings: &Settings) -> String {
        let state = IssuerState { sub: "issuer".into() };
        settings.codec().encode(&state, 600).expect("should encode")
    }

    pub fn c_nonce(settings: &Settings) -> String {
        settings.codec().encode(&Nonce { sub: "issuer".into() }, 600).expect("should encode")
    }

    pub fn access_token(settings: &Settings, client_id: &str, scope: &str) -> String {
        let token = AccessToken {
            client_id: client_id.into(),
            sub: "alice".into(),
            scope: scope.into(),
            previous_code: None,
        };
        settings.codec().encode(&token, 600).expect("should encode")
    }

    pub fn jwt_proof(holder: &SigningKey, nonce: &str) -> String {
        let header = Header {
            typ: Some("openid4vci-proof+jwt".into()),
            jwk: Some(PublicKeyJwk::from(holder.verifying_key())),
            ..Header::default()
        };
        jws::encode(header, &json!({"aud": "https://issuer.example", "nonce": nonce}), holder)
            .expect("should sign")
    }

    /// A credential endpoint request context carrying a DPoP proof bound to
    /// `access_token`.
    pub fn http(holder: &SigningKey, access_token: &str) -> HttpContext {
        let header = Header {
            typ: Some(DPOP_TYPE.into()),
            jwk: Some(PublicKeyJwk::from(holder.verifying_key())),
            ..Header::default()
        };
        let claims = json!({
            "jti": "dpop-1",
            "htm": "POST",
            "htu": CREDENTIAL_URI,
            "iat": Utc::now().timestamp(),
            "ath": ath(access_token),
        });
        HttpContext {
            method: "POST".into(),
            uri: CREDENTIAL_URI.into(),
            authorization: Some(format!("DPoP {access_token}")),
            dpop: vec![jws::encode(header, &claims, holder).expect("should sign")],
        }
    }
}
