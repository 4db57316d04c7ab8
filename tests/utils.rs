#![allow(missing_docs)]
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use base64ct::{Base64, Encoding};
use chrono::Utc;
use oid4vci_issuer::catalog::CredentialConfiguration;
use oid4vci_issuer::client::OauthClient;
use oid4vci_issuer::config::{Config, SecretConfig, SigningKeyConfig};
use oid4vci_issuer::dpop::{ath, DPOP_TYPE};
use oid4vci_issuer::jose::jws::{self, Header};
use oid4vci_issuer::jose::PublicKeyJwk;
use oid4vci_issuer::provider::{Dataset, Provider, Render, Subject};
use oid4vci_issuer::types::{CredentialRequest, HttpContext};
use oid4vci_issuer::Issuer;
use p256::ecdsa::SigningKey;
use p256::pkcs8::DecodePrivateKey;
use rand::rngs::OsRng;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};
use rstest::fixture;
use serde_json::json;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub const ISSUER_URL: &str = "https://issuer.example";
pub const WALLET_URL: &str = "https://wallet.example/offer";
pub const REDIRECT_URI: &str = "https://wallet.example/callback";
pub const CLIENT_ID: &str = "wallet";
pub const SERVICE_ID: &str = "backend";
pub const SERVICE_SECRET: &str = "s3cr3t";
pub const CREDENTIAL_URI: &str = "https://issuer.example/credential";
pub const DEFERRED_URI: &str = "https://issuer.example/deferred_credential";

static INIT: Once = Once::new();

pub fn init_tracer() {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).expect("subscriber set");
    });
}

/// Subject claims for any holder. Issuance stays pending while `pending` is
/// set.
#[derive(Clone, Default)]
pub struct ProviderImpl {
    pub pending: Arc<AtomicBool>,
}

impl ProviderImpl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pending(&self, pending: bool) {
        self.pending.store(pending, Ordering::SeqCst);
    }
}

impl Provider for ProviderImpl {}

impl Subject for ProviderImpl {
    async fn dataset(
        &self, subject_id: &str, configuration: &CredentialConfiguration,
    ) -> anyhow::Result<Dataset> {
        let claims = match configuration.credential_configuration_id.as_str() {
            "Identity_SD_JWT" => json!({
                "sub": subject_id,
                "given_name": "Normal",
                "family_name": "Person",
                "birthdate": "1990-01-01",
            }),
            "Employment_SD_JWT" => json!({
                "sub": subject_id,
                "employer": "Credibil",
                "position": "Engineer",
            }),
            other => anyhow::bail!("no claims for {other}"),
        };
        Ok(Dataset {
            claims: claims.as_object().cloned().unwrap_or_default(),
            pending: self.pending.load(Ordering::SeqCst),
        })
    }
}

impl Render for ProviderImpl {
    async fn qrcode(&self, data: &str) -> anyhow::Result<String> {
        Ok(format!("data:image/png;base64,{}", Base64::encode_string(data.as_bytes())))
    }
}

#[fixture]
pub fn provider() -> ProviderImpl {
    ProviderImpl::new()
}

/// A certificate authority attesting wallet instance keys.
pub struct WalletProvider {
    pub root: rcgen::Certificate,
    key: KeyPair,
}

impl WalletProvider {
    pub fn new(name: &str) -> Self {
        let key = KeyPair::generate().expect("should generate key");
        let mut params = CertificateParams::new(vec![]).expect("should create params");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        params.distinguished_name.push(DnType::CommonName, name);
        let root = params.self_signed(&key).expect("should self-sign");
        Self { root, key }
    }

    /// An attestation proof for a fresh wallet instance key.
    pub fn attest(&self, nonce: &str) -> (String, SigningKey) {
        let leaf_key = KeyPair::generate().expect("should generate key");
        let mut params = CertificateParams::new(vec![]).expect("should create params");
        params.distinguished_name.push(DnType::CommonName, "Wallet Instance");
        let leaf = params.signed_by(&leaf_key, &self.root, &self.key).expect("should sign");

        let signing_key =
            SigningKey::from_pkcs8_der(&leaf_key.serialize_der()).expect("should load key");
        let header = Header {
            x5c: Some(vec![Base64::encode_string(leaf.der())]),
            ..Header::default()
        };
        let proof = jws::encode(header, &json!({"aud": ISSUER_URL, "nonce": nonce}), &signing_key)
            .expect("should sign");
        (proof, signing_key)
    }
}

pub fn config(trusted: &WalletProvider) -> Config {
    let key = KeyPair::generate().expect("should generate key");
    Config {
        issuer_url: ISSUER_URL.into(),
        wallet_url: WALLET_URL.into(),
        clients: vec![
            OauthClient {
                id: CLIENT_ID.into(),
                redirect_uris: vec![REDIRECT_URI.into()],
                scopes: vec!["identity".into(), "employment".into()],
                ..OauthClient::default()
            },
            OauthClient {
                id: SERVICE_ID.into(),
                secret: Some(SERVICE_SECRET.into()),
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
                vct: Some("https://credentials.example/identity".into()),
                ..CredentialConfiguration::default()
            },
            CredentialConfiguration {
                credential_configuration_id: "Employment_SD_JWT".into(),
                scope: "employment".into(),
                format: "vc+sd-jwt".into(),
                vct: Some("https://credentials.example/employment".into()),
                deferred: true,
                ..CredentialConfiguration::default()
            },
        ],
        trusted_roots: vec![trusted.root.pem()],
        secret: SecretConfig {
            secret: "integration-secret".into(),
            ..SecretConfig::default()
        },
        signing: SigningKeyConfig {
            key_pem: key.serialize_pem(),
            certificate_chain: vec![],
        },
        ..Config::default()
    }
}

pub fn issuer(provider: ProviderImpl, trusted: &WalletProvider) -> Issuer<ProviderImpl> {
    Issuer::new(config(trusted), provider).expect("should configure")
}

/// A wallet holding one proof-of-possession key.
pub struct Holder {
    pub key: SigningKey,
}

impl Holder {
    pub fn new() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn jwk(&self) -> PublicKeyJwk {
        PublicKeyJwk::from(self.key.verifying_key())
    }

    pub fn jwt_proof(&self, nonce: &str) -> String {
        let header = Header {
            typ: Some("openid4vci-proof+jwt".into()),
            jwk: Some(self.jwk()),
            ..Header::default()
        };
        jws::encode(header, &json!({"aud": ISSUER_URL, "nonce": nonce}), &self.key)
            .expect("should sign")
    }

    /// Request context for a POST to `uri`, with a DPoP proof bound to
    /// `access_token`.
    pub fn http(&self, uri: &str, access_token: &str) -> HttpContext {
        let header = Header {
            typ: Some(DPOP_TYPE.into()),
            jwk: Some(self.jwk()),
            ..Header::default()
        };
        let claims = json!({
            "jti": uuid::Uuid::new_v4().to_string(),
            "htm": "POST",
            "htu": uri,
            "iat": Utc::now().timestamp(),
            "ath": ath(access_token),
        });
        HttpContext {
            method: "POST".into(),
            uri: uri.into(),
            authorization: Some(format!("DPoP {access_token}")),
            dpop: vec![jws::encode(header, &claims, &self.key).expect("should sign")],
        }
    }

    pub fn credential_request(&self, ids: &[&str], nonce: &str) -> CredentialRequest {
        CredentialRequest {
            credential_configuration_ids: Some(ids.iter().map(ToString::to_string).collect()),
            proofs: Some(BTreeMap::from([("jwt".to_string(), vec![self.jwt_proof(nonce)])])),
            ..CredentialRequest::default()
        }
    }
}
