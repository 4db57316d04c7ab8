//! # Configuration
//!
//! [`Config`] is the deserializable configuration supplied by the host, with
//! defaults baked into `Default`. It is validated exactly once, by
//! [`Config::validate`], producing [`Settings`]: parsed keys and
//! certificates, indexed clients and credential configurations, and the
//! token codec.
//!
//! Statements never see the whole of [`Settings`]. Each takes the narrow
//! capability trait covering the configuration it needs.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64ct::{Base64, Encoding};
use p256::ecdsa::SigningKey;
use p256::pkcs8::DecodePrivateKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use x509_cert::der::Encode;
use x509_cert::Certificate;

use crate::catalog::{Catalog, CredentialConfiguration};
use crate::client::{ClientRegistry, OauthClient};
use crate::codec::secret::{bucket, SecretRing, SecretStore};
use crate::codec::TokenCodec;
use crate::jose::jwe::EncryptionAlgorithm;

/// Invalid configuration, reported by [`Config::validate`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is missing or empty.
    #[error("`{0}` is required")]
    Missing(&'static str),

    /// Two clients share an id.
    #[error("duplicate client id: {0}")]
    DuplicateClient(String),

    /// A credential configuration is incomplete.
    #[error("invalid credential configuration `{0}`: {1}")]
    CredentialConfiguration(String, &'static str),

    /// A trusted root certificate could not be parsed.
    #[error("invalid trusted root: {0}")]
    TrustedRoot(String),

    /// The signing key or certificate chain could not be parsed.
    #[error("invalid signing configuration: {0}")]
    Signing(String),

    /// Rotation is enabled but not fully configured.
    #[error("invalid secret rotation: {0}")]
    Rotation(&'static str),
}

/// Issuer configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Public URL of the issuer, used as `iss` and to build endpoint URLs.
    pub issuer_url: String,

    /// Wallet URL credential offers are sent to.
    pub wallet_url: String,

    /// Registered OAuth clients.
    pub clients: Vec<OauthClient>,

    /// The issuer's own client.
    pub issuer_client: OauthClient,

    /// Supported credential configurations.
    pub credential_configurations: Vec<CredentialConfiguration>,

    /// PEM encoded root certificates trusted for attestation proofs.
    pub trusted_roots: Vec<String>,

    /// Artifact lifetimes.
    pub ttl: Ttl,

    /// Content encryption for artifacts.
    pub encryption: EncryptionAlgorithm,

    /// Artifact encryption secrets.
    pub secret: SecretConfig,

    /// Credential and metadata signing key.
    pub signing: SigningKeyConfig,

    /// Maximum age of a DPoP proof, in seconds.
    pub dpop_max_age: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            issuer_url: String::new(),
            wallet_url: String::new(),
            clients: vec![],
            issuer_client: OauthClient {
                id: "issuer".into(),
                ..OauthClient::default()
            },
            credential_configurations: vec![],
            trusted_roots: vec![],
            ttl: Ttl::default(),
            encryption: EncryptionAlgorithm::default(),
            secret: SecretConfig::default(),
            signing: SigningKeyConfig::default(),
            dpop_max_age: 300,
        }
    }
}

/// Artifact lifetimes, in seconds.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Ttl {
    /// Pushed authorization request.
    pub request_uri: u64,

    /// Authorization code.
    pub authorization_code: u64,

    /// Access token and `c_nonce`.
    pub access_token: u64,

    /// Issuer state in a credential offer.
    pub issuer_state: u64,

    /// Polling interval suggested for deferred issuance.
    pub deferred_interval: u64,
}

impl Default for Ttl {
    fn default() -> Self {
        Self {
            request_uri: 60,
            authorization_code: 60,
            access_token: 3600,
            issuer_state: 86400,
            deferred_interval: 5,
        }
    }
}

/// Artifact encryption secrets.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretConfig {
    /// Static secret, used when rotation is disabled.
    pub secret: String,

    /// Older static secrets still accepted for decryption, most recent first.
    pub previous_secrets: Vec<String>,

    /// Base secret rotated secrets are derived from.
    pub base_secret: String,

    /// Derive a new secret every `rotation_ttl` seconds.
    pub rotation_enabled: bool,

    /// Rotation period, in seconds.
    pub rotation_ttl: u64,
}

impl fmt::Debug for SecretConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretConfig")
            .field("rotation_enabled", &self.rotation_enabled)
            .field("rotation_ttl", &self.rotation_ttl)
            .finish_non_exhaustive()
    }
}

/// Credential and metadata signing material.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningKeyConfig {
    /// PKCS#8 PEM encoded P-256 private key.
    pub key_pem: String,

    /// PEM encoded certificates for the signing key, leaf first. Published
    /// as the `x5c` header of signed metadata.
    pub certificate_chain: Vec<String>,
}

impl fmt::Debug for SigningKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyConfig")
            .field("certificate_chain", &self.certificate_chain.len())
            .finish_non_exhaustive()
    }
}

/// Rotation parameters for a validated configuration.
#[derive(Clone)]
pub struct Rotation {
    /// Base secret rotated secrets are derived from.
    pub base_secret: String,

    /// Rotation period.
    pub ttl: Duration,

    /// Bucket the secret ring was seeded for.
    pub counter: u64,
}

impl fmt::Debug for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rotation")
            .field("ttl", &self.ttl)
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Validate the configuration and compile it into [`Settings`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for the first invalid value found.
    pub fn validate(self) -> Result<Settings, ConfigError> {
        if self.issuer_url.is_empty() {
            return Err(ConfigError::Missing("issuer_url"));
        }
        if self.wallet_url.is_empty() {
            return Err(ConfigError::Missing("wallet_url"));
        }
        if self.issuer_client.id.is_empty() {
            return Err(ConfigError::Missing("issuer_client.id"));
        }

        let mut ids = vec![self.issuer_client.id.as_str()];
        for client in &self.clients {
            if client.id.is_empty() {
                return Err(ConfigError::Missing("clients.id"));
            }
            if ids.contains(&client.id.as_str()) {
                return Err(ConfigError::DuplicateClient(client.id.clone()));
            }
            ids.push(&client.id);
        }

        for config in &self.credential_configurations {
            if config.credential_configuration_id.is_empty() {
                return Err(ConfigError::Missing("credential_configurations.credential_configuration_id"));
            }
            if config.scope.is_empty() {
                let id = config.credential_configuration_id.clone();
                return Err(ConfigError::CredentialConfiguration(id, "scope is required"));
            }
            if config.vct.is_none() && config.doctype.is_none() {
                let id = config.credential_configuration_id.clone();
                return Err(ConfigError::CredentialConfiguration(id, "vct or doctype is required"));
            }
        }

        let mut trusted_roots = vec![];
        for pem in &self.trusted_roots {
            trusted_roots.extend(load_pem(pem).map_err(ConfigError::TrustedRoot)?);
        }

        if self.signing.key_pem.is_empty() {
            return Err(ConfigError::Missing("signing.key_pem"));
        }
        let signing_key = SigningKey::from_pkcs8_pem(&self.signing.key_pem)
            .map_err(|e| ConfigError::Signing(e.to_string()))?;
        let mut certificate_chain = vec![];
        for pem in &self.signing.certificate_chain {
            for cert in load_pem(pem).map_err(ConfigError::Signing)? {
                let der = cert.to_der().map_err(|e| ConfigError::Signing(e.to_string()))?;
                certificate_chain.push(Base64::encode_string(&der));
            }
        }

        let (ring, rotation) = self.secret.ring()?;
        let codec = TokenCodec::new(Arc::new(SecretStore::new(ring)), self.encryption);

        Ok(Settings {
            issuer_url: self.issuer_url.trim_end_matches('/').to_string(),
            wallet_url: self.wallet_url,
            clients: ClientRegistry::new(self.clients, self.issuer_client),
            catalog: Catalog::new(self.credential_configurations),
            trusted_roots,
            ttl: self.ttl,
            codec,
            rotation,
            signing_key,
            certificate_chain,
            dpop_max_age: self.dpop_max_age,
        })
    }
}

fn load_pem(pem: &str) -> Result<Vec<Certificate>, String> {
    if pem.trim().is_empty() {
        return Err("empty certificate".into());
    }
    Certificate::load_pem_chain(pem.as_bytes()).map_err(|e| e.to_string())
}

impl SecretConfig {
    fn ring(&self) -> Result<(SecretRing, Option<Rotation>), ConfigError> {
        if !self.rotation_enabled {
            if self.secret.is_empty() {
                return Err(ConfigError::Missing("secret.secret"));
            }
            return Ok((SecretRing::new(self.secret.clone(), self.previous_secrets.clone()), None));
        }

        if self.base_secret.is_empty() {
            return Err(ConfigError::Rotation("base_secret is required"));
        }
        if self.rotation_ttl == 0 {
            return Err(ConfigError::Rotation("rotation_ttl must be positive"));
        }

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let counter = bucket(now.as_secs(), self.rotation_ttl);
        let rotation = Rotation {
            base_secret: self.base_secret.clone(),
            ttl: Duration::from_secs(self.rotation_ttl),
            counter,
        };
        Ok((SecretRing::seeded(&self.base_secret, counter), Some(rotation)))
    }
}

/// Validated, compiled configuration.
#[derive(Debug)]
pub struct Settings {
    issuer_url: String,
    wallet_url: String,
    clients: ClientRegistry,
    catalog: Catalog,
    trusted_roots: Vec<Certificate>,
    ttl: Ttl,
    codec: TokenCodec,
    rotation: Option<Rotation>,
    signing_key: SigningKey,
    certificate_chain: Vec<String>,
    dpop_max_age: u64,
}

impl Settings {
    /// Rotation parameters, when rotation is enabled.
    #[must_use]
    pub const fn rotation(&self) -> Option<&Rotation> {
        self.rotation.as_ref()
    }
}

/// Registered clients.
pub trait ClientsConfig {
    /// The client registry, including the issuer client.
    fn clients(&self) -> &ClientRegistry;
}

/// Issuer identity.
pub trait IssuerConfig {
    /// Issuer URL, without a trailing slash.
    fn issuer_url(&self) -> &str;

    /// Wallet URL credential offers are sent to.
    fn wallet_url(&self) -> &str;
}

/// Supported credentials.
pub trait CatalogConfig {
    /// The credential catalog.
    fn catalog(&self) -> &Catalog;
}

/// Artifact encryption and lifetimes.
pub trait TokenConfig {
    /// Codec for encrypted artifacts.
    fn codec(&self) -> &TokenCodec;

    /// Artifact lifetimes.
    fn ttl(&self) -> &Ttl;
}

/// Attestation trust anchors.
pub trait TrustConfig {
    /// Trusted root certificates.
    fn trusted_roots(&self) -> &[Certificate];
}

/// Credential and metadata signing.
pub trait SigningConfig {
    /// ES256 signing key.
    fn signing_key(&self) -> &SigningKey;

    /// Base64 DER certificates for the signing key, leaf first.
    fn certificate_chain(&self) -> &[String];
}

/// DPoP proof acceptance.
pub trait DpopConfig {
    /// Maximum age of a DPoP proof, in seconds.
    fn dpop_max_age(&self) -> u64;
}

impl ClientsConfig for Settings {
    fn clients(&self) -> &ClientRegistry {
        &self.clients
    }
}

impl IssuerConfig for Settings {
    fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    fn wallet_url(&self) -> &str {
        &self.wallet_url
    }
}

impl CatalogConfig for Settings {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl TokenConfig for Settings {
    fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    fn ttl(&self) -> &Ttl {
        &self.ttl
    }
}

impl TrustConfig for Settings {
    fn trusted_roots(&self) -> &[Certificate] {
        &self.trusted_roots
    }
}

impl SigningConfig for Settings {
    fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    fn certificate_chain(&self) -> &[String] {
        &self.certificate_chain
    }
}

impl DpopConfig for Settings {
    fn dpop_max_age(&self) -> u64 {
        self.dpop_max_age
    }
}
