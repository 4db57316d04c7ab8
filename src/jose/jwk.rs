//! # JSON Web Key (JWK)
//!
//! A JWK ([RFC7517]) is a JSON representation of a cryptographic key. Holder
//! keys arrive as JWKs embedded in DPoP and proof headers, and the key bound
//! to an issued credential (`cnf.jwk`) is one too.
//!
//! [RFC7517]: https://www.rfc-editor.org/rfc/rfc7517

use anyhow::{anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};

/// Simplified public JSON Web Key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct PublicKeyJwk {
    /// Key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Key type.
    pub kty: KeyType,

    /// Cryptographic curve. Not used for RSA keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<Curve>,

    /// X coordinate (EC) or public key (OKP).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// Y coordinate. EC keys only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// RSA modulus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// Cryptographic key type.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub enum KeyType {
    /// Elliptic curve key pair
    #[default]
    #[serde(rename = "EC")]
    Ec,

    /// Octet key pair (Edwards curve)
    #[serde(rename = "OKP")]
    Okp,

    /// RSA key pair
    #[serde(rename = "RSA")]
    Rsa,

    /// Octet string. Symmetric keys are never accepted as holder keys.
    #[serde(rename = "oct")]
    Oct,
}

/// Cryptographic curve type.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub enum Curve {
    /// NIST P-256
    #[serde(rename = "P-256")]
    P256,

    /// NIST P-384
    #[serde(rename = "P-384")]
    P384,

    /// Ed25519
    Ed25519,
}

impl PublicKeyJwk {
    /// Build a P-256 JWK from a SEC1-encoded point (compressed or not).
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid P-256 point.
    pub fn from_p256_sec1(sec1: &[u8]) -> anyhow::Result<Self> {
        let key = p256::PublicKey::from_sec1_bytes(sec1)
            .map_err(|e| anyhow!("invalid P-256 public key: {e}"))?;
        Ok(Self::from(&p256::ecdsa::VerifyingKey::from(key)))
    }

    /// Decoded X coordinate.
    pub(crate) fn x_bytes(&self) -> anyhow::Result<Vec<u8>> {
        decode_member("x", self.x.as_deref())
    }

    /// Decoded Y coordinate.
    pub(crate) fn y_bytes(&self) -> anyhow::Result<Vec<u8>> {
        decode_member("y", self.y.as_deref())
    }

    /// Uncompressed SEC1 encoding of an EC key.
    pub(crate) fn sec1(&self) -> anyhow::Result<Vec<u8>> {
        if self.kty != KeyType::Ec {
            bail!("key is not an EC key");
        }
        let mut sec1 = vec![0x04];
        sec1.append(&mut self.x_bytes()?);
        sec1.append(&mut self.y_bytes()?);
        Ok(sec1)
    }
}

impl From<&p256::ecdsa::VerifyingKey> for PublicKeyJwk {
    fn from(key: &p256::ecdsa::VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        Self {
            kty: KeyType::Ec,
            crv: Some(Curve::P256),
            x: point.x().map(|x| Base64UrlUnpadded::encode_string(x)),
            y: point.y().map(|y| Base64UrlUnpadded::encode_string(y)),
            ..Self::default()
        }
    }
}

impl From<&ed25519_dalek::VerifyingKey> for PublicKeyJwk {
    fn from(key: &ed25519_dalek::VerifyingKey) -> Self {
        Self {
            kty: KeyType::Okp,
            crv: Some(Curve::Ed25519),
            x: Some(Base64UrlUnpadded::encode_string(key.as_bytes())),
            ..Self::default()
        }
    }
}

fn decode_member(name: &str, value: Option<&str>) -> anyhow::Result<Vec<u8>> {
    let Some(value) = value else {
        bail!("jwk `{name}` is missing");
    };
    Base64UrlUnpadded::decode_vec(value).map_err(|e| anyhow!("jwk `{name}` is invalid: {e}"))
}
