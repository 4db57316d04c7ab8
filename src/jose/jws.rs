//! # JSON Web Signature (JWS)
//!
//! JWS ([RFC7515]) represents content secured with digital signatures using
//! JSON-based data structures. Cryptographic algorithms and identifiers are
//! described in the JWA ([RFC7518]) specification.
//!
//! Only asymmetric algorithms are recognised. A JWS claiming an `HS*` or
//! `none` algorithm fails to decode.
//!
//! [RFC7515]: https://www.rfc-editor.org/rfc/rfc7515
//! [RFC7518]: https://www.rfc-editor.org/rfc/rfc7518

use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::{anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use signature::Verifier as _;

use crate::jose::jwk::{Curve, KeyType, PublicKeyJwk};

/// Asymmetric signing algorithms accepted in JWS headers.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Algorithm {
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
    /// Edwards-curve signatures (Ed25519)
    EdDSA,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
}

impl FromStr for Algorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "ES256" => Ok(Self::ES256),
            "ES384" => Ok(Self::ES384),
            "EdDSA" => Ok(Self::EdDSA),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            _ => bail!("unsupported algorithm: {s}"),
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// JOSE header of a compact JWS.
///
/// `alg` is kept as the raw string so callers can report exactly which
/// header member is unacceptable.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Header {
    /// Signing algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Media type of the JWS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Embedded public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<PublicKeyJwk>,

    /// X.509 certificate chain: base64 (not base64url) DER, leaf first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
}

impl Header {
    /// The parsed signing algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error when `alg` is missing or not an accepted asymmetric
    /// algorithm.
    pub fn algorithm(&self) -> anyhow::Result<Algorithm> {
        let Some(alg) = &self.alg else {
            bail!("`alg` is missing");
        };
        alg.parse()
    }
}

/// A compact JWS split into its parts. The signature has not been verified.
#[derive(Clone, Debug)]
pub struct Jws<T> {
    /// Protected header.
    pub header: Header,

    /// Decoded payload.
    pub claims: T,

    signing_input: String,
    signature: Vec<u8>,
}

impl<T: DeserializeOwned> Jws<T> {
    /// Split and decode a compact JWS without verifying its signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a three-part compact JWS with a
    /// JSON header and payload.
    pub fn decode(token: &str) -> anyhow::Result<Self> {
        let parts = token.split('.').collect::<Vec<&str>>();
        if parts.len() != 3 {
            bail!("invalid Compact JWS format");
        }

        let decoded = Base64UrlUnpadded::decode_vec(parts[0])
            .map_err(|e| anyhow!("issue decoding header: {e}"))?;
        let header: Header = serde_json::from_slice(&decoded)
            .map_err(|e| anyhow!("issue deserializing header: {e}"))?;
        let decoded = Base64UrlUnpadded::decode_vec(parts[1])
            .map_err(|e| anyhow!("issue decoding claims: {e}"))?;
        let claims = serde_json::from_slice(&decoded)
            .map_err(|e| anyhow!("issue deserializing claims: {e}"))?;
        let signature = Base64UrlUnpadded::decode_vec(parts[2])
            .map_err(|e| anyhow!("issue decoding signature: {e}"))?;

        Ok(Self {
            header,
            claims,
            signing_input: format!("{}.{}", parts[0], parts[1]),
            signature,
        })
    }

    /// Verify the signature with the provided key using the header's `alg`.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is unsupported, the key does not
    /// match the algorithm, or the signature is invalid.
    pub fn verify(&self, jwk: &PublicKeyJwk) -> anyhow::Result<()> {
        verify(self.header.algorithm()?, jwk, self.signing_input.as_bytes(), &self.signature)
    }
}

/// Anything able to produce a JWS signature.
pub trait Signer {
    /// Algorithm used by the signer.
    fn algorithm(&self) -> Algorithm;

    /// Sign the message, returning the raw JWS signature bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    fn try_sign(&self, msg: &[u8]) -> anyhow::Result<Vec<u8>>;
}

impl Signer for p256::ecdsa::SigningKey {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ES256
    }

    fn try_sign(&self, msg: &[u8]) -> anyhow::Result<Vec<u8>> {
        let sig: p256::ecdsa::Signature = signature::Signer::try_sign(self, msg)?;
        Ok(sig.to_bytes().to_vec())
    }
}

impl Signer for ed25519_dalek::SigningKey {
    fn algorithm(&self) -> Algorithm {
        Algorithm::EdDSA
    }

    fn try_sign(&self, msg: &[u8]) -> anyhow::Result<Vec<u8>> {
        let sig: ed25519_dalek::Signature = signature::Signer::try_sign(self, msg)?;
        Ok(sig.to_bytes().to_vec())
    }
}

/// Encode the provided header and claims and sign, returning a compact JWS.
/// The header's `alg` is set from the signer.
///
/// # Errors
///
/// Returns an error if serialization or signing fails.
pub fn encode<T: Serialize>(
    mut header: Header, claims: &T, signer: &impl Signer,
) -> anyhow::Result<String> {
    header.alg = Some(signer.algorithm().to_string());

    let header = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&header)?);
    let claims = Base64UrlUnpadded::encode_string(&serde_json::to_vec(claims)?);
    let payload = format!("{header}.{claims}");

    let sig = signer.try_sign(payload.as_bytes())?;
    let sig_enc = Base64UrlUnpadded::encode_string(&sig);

    Ok(format!("{payload}.{sig_enc}"))
}

/// Verify the signature of the provided message using the JWK.
///
/// # Errors
///
/// Will return an error if the signature is invalid, the JWK is invalid, or
/// the key does not suit the algorithm.
pub fn verify(alg: Algorithm, jwk: &PublicKeyJwk, msg: &[u8], sig: &[u8]) -> anyhow::Result<()> {
    match (alg, &jwk.kty, jwk.crv.as_ref()) {
        (Algorithm::ES256, KeyType::Ec, Some(Curve::P256)) => verify_es256(jwk, msg, sig),
        (Algorithm::ES384, KeyType::Ec, Some(Curve::P384)) => verify_es384(jwk, msg, sig),
        (Algorithm::EdDSA, KeyType::Okp, Some(Curve::Ed25519)) => verify_eddsa(jwk, msg, sig),
        (Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512, KeyType::Rsa, _) => {
            verify_rsa(alg, jwk, msg, sig)
        }
        _ => bail!("key does not match algorithm {alg}"),
    }
}

fn verify_es256(jwk: &PublicKeyJwk, msg: &[u8], sig: &[u8]) -> anyhow::Result<()> {
    use p256::ecdsa::{Signature, VerifyingKey};

    let verifying_key = VerifyingKey::from_sec1_bytes(&jwk.sec1()?)?;
    let signature = Signature::from_slice(sig)?;
    Ok(verifying_key.verify(msg, &signature)?)
}

fn verify_es384(jwk: &PublicKeyJwk, msg: &[u8], sig: &[u8]) -> anyhow::Result<()> {
    use p384::ecdsa::{Signature, VerifyingKey};

    let verifying_key = VerifyingKey::from_sec1_bytes(&jwk.sec1()?)?;
    let signature = Signature::from_slice(sig)?;
    Ok(verifying_key.verify(msg, &signature)?)
}

fn verify_eddsa(jwk: &PublicKeyJwk, msg: &[u8], sig: &[u8]) -> anyhow::Result<()> {
    use ed25519_dalek::{Signature, VerifyingKey};

    let bytes: [u8; 32] =
        jwk.x_bytes()?.try_into().map_err(|_| anyhow!("invalid public key length"))?;
    let verifying_key = VerifyingKey::from_bytes(&bytes)
        .map_err(|e| anyhow!("unable to build verifying key: {e}"))?;
    let signature =
        Signature::from_slice(sig).map_err(|e| anyhow!("unable to build signature: {e}"))?;

    verifying_key
        .verify_strict(msg, &signature)
        .map_err(|e| anyhow!("unable to verify signature: {e}"))
}

fn verify_rsa(alg: Algorithm, jwk: &PublicKeyJwk, msg: &[u8], sig: &[u8]) -> anyhow::Result<()> {
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::{BigUint, RsaPublicKey};

    let (Some(n), Some(e)) = (&jwk.n, &jwk.e) else {
        bail!("rsa jwk is missing `n` or `e`");
    };
    let n = BigUint::from_bytes_be(&Base64UrlUnpadded::decode_vec(n)?);
    let e = BigUint::from_bytes_be(&Base64UrlUnpadded::decode_vec(e)?);
    let public_key = RsaPublicKey::new(n, e)?;
    let signature = Signature::try_from(sig)?;

    match alg {
        Algorithm::RS256 => VerifyingKey::<Sha256>::new(public_key).verify(msg, &signature)?,
        Algorithm::RS384 => VerifyingKey::<Sha384>::new(public_key).verify(msg, &signature)?,
        Algorithm::RS512 => VerifyingKey::<Sha512>::new(public_key).verify(msg, &signature)?,
        _ => bail!("{alg} is not an RSA algorithm"),
    }
    Ok(())
}
