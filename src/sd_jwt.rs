//! # SD-JWT Credentials
//!
//! Mints SD-JWT verifiable credentials ([SD-JWT VC]). Every top-level subject
//! claim becomes a disclosure `[salt, name, value]`; the signed payload holds
//! only the SHA-256 digests of the disclosures (`_sd`), the holder key
//! (`cnf.jwk`), the issuer and the credential type.
//!
//! The compact serialization is the signed JWT followed by each disclosure,
//! every part terminated by `~`.
//!
//! [SD-JWT VC]: https://www.ietf.org/archive/id/draft-ietf-oauth-sd-jwt-vc-08.html

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::catalog::CredentialConfiguration;
use crate::config::{IssuerConfig, SigningConfig};
use crate::error::server;
use crate::jose::jws::{self, Header};
use crate::jose::PublicKeyJwk;
use crate::Result;

/// `typ` header of an SD-JWT credential.
pub const SD_JWT_TYPE: &str = "vc+sd-jwt";

/// Signed payload of an SD-JWT credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SdJwtClaims {
    /// Digests of the disclosures.
    #[serde(rename = "_sd")]
    pub sd: Vec<String>,

    /// Digest algorithm. Always `sha-256`.
    #[serde(rename = "_sd_alg")]
    pub sd_alg: String,

    /// Credential issuer.
    pub iss: String,

    /// Issued at.
    pub iat: i64,

    /// Holder key confirmation.
    pub cnf: Confirmation,

    /// Verifiable credential type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vct: Option<String>,

    /// mDL document type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctype: Option<String>,
}

/// Key confirmation (`cnf`) claim.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Confirmation {
    /// The holder's public key.
    pub jwk: PublicKeyJwk,
}

/// Build a base64url encoded disclosure with a fresh 128-bit salt.
fn disclosure(name: &str, value: &Value) -> Result<String> {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    let salt = Base64UrlUnpadded::encode_string(&salt);

    let encoded = serde_json::to_vec(&json!([salt, name, value]))
        .map_err(|e| server!("issue serializing disclosure: {e}"))?;
    Ok(Base64UrlUnpadded::encode_string(&encoded))
}

/// SHA-256 digest of an encoded disclosure, as carried in `_sd`.
#[must_use]
pub fn digest(disclosure: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(disclosure.as_bytes()))
}

/// Mint an SD-JWT credential for `claims`, bound to `holder_key`.
///
/// # Errors
///
/// Returns `unknown_error` if the credential cannot be serialized or signed.
pub fn mint(
    claims: &Map<String, Value>, configuration: &CredentialConfiguration,
    holder_key: &PublicKeyJwk, config: &(impl IssuerConfig + SigningConfig),
) -> Result<String> {
    tracing::debug!("sd_jwt::mint");

    let mut disclosures = Vec::with_capacity(claims.len());
    for (name, value) in claims {
        disclosures.push(disclosure(name, value)?);
    }

    // digest order must not follow claim order
    let mut sd = disclosures.iter().map(|d| digest(d)).collect::<Vec<_>>();
    sd.sort();

    let payload = SdJwtClaims {
        sd,
        sd_alg: "sha-256".into(),
        iss: config.issuer_url().to_string(),
        iat: Utc::now().timestamp(),
        cnf: Confirmation {
            jwk: holder_key.clone(),
        },
        vct: configuration.vct.clone(),
        doctype: configuration.doctype.clone(),
    };

    let chain = config.certificate_chain();
    let header = Header {
        typ: Some(SD_JWT_TYPE.into()),
        x5c: (!chain.is_empty()).then(|| chain.to_vec()),
        ..Header::default()
    };
    let jwt = jws::encode(header, &payload, config.signing_key())
        .map_err(|e| server!("issue signing credential: {e}"))?;

    let mut sd_jwt = format!("{jwt}~");
    for d in &disclosures {
        sd_jwt.push_str(d);
        sd_jwt.push('~');
    }
    Ok(sd_jwt)
}
