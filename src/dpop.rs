//! # DPoP Proof Validation
//!
//! Verifies the DPoP proof ([RFC9449]) accompanying a credential request. A
//! proof is a JWS signed by the key in its own `jwk` header, bound to one
//! HTTP request (`htm`, `htu`) and to the access token it accompanies
//! (`ath`).
//!
//! Header shape failures report the offending member. Every other failure is
//! reported as `invalid dpop jwt`.
//!
//! [RFC9449]: https://www.rfc-editor.org/rfc/rfc9449

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::DpopConfig;
use crate::error::invalid;
use crate::jose::jws::Jws;
use crate::jose::PublicKeyJwk;
use crate::Result;

/// `typ` header value of a DPoP proof.
pub const DPOP_TYPE: &str = "dpop+jwt";

/// The HTTP request a DPoP proof must be bound to.
#[derive(Clone, Copy, Debug)]
pub struct Binding<'a> {
    /// Request method.
    pub method: &'a str,

    /// Absolute request URI, including any query string.
    pub uri: &'a str,

    /// Access token presented with the request.
    pub access_token: &'a str,
}

#[derive(Deserialize)]
struct DpopClaims {
    jti: Option<String>,
    htm: Option<String>,
    htu: Option<String>,
    iat: Option<i64>,
    ath: Option<String>,
}

/// The `ath` value binding a proof to `access_token`.
#[must_use]
pub fn ath(access_token: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(access_token.as_bytes()))
}

/// Verify the DPoP header values sent with a request, returning the proof's
/// public key.
///
/// # Errors
///
/// Returns `invalid_request` when there is not exactly one proof or the proof
/// does not verify against `binding`.
pub fn verify(proofs: &[String], binding: Binding, config: &impl DpopConfig) -> Result<PublicKeyJwk> {
    tracing::debug!("dpop::verify");

    let proof = match proofs {
        [] => return Err(invalid!("dpop jwt is missing")),
        [proof] => proof,
        _ => return Err(invalid!("multiple dpop jwts")),
    };

    let Ok(jws) = Jws::<DpopClaims>::decode(proof) else {
        return Err(invalid!("invalid dpop jwt"));
    };

    // header shape
    if jws.header.typ.as_deref() != Some(DPOP_TYPE) {
        return Err(invalid!("dpop jwt typ is invalid"));
    }
    if jws.header.algorithm().is_err() {
        return Err(invalid!("dpop jwt alg is invalid"));
    }
    let Some(jwk) = &jws.header.jwk else {
        return Err(invalid!("dpop jwt jwk is missing"));
    };

    if jws.verify(jwk).is_err() {
        return Err(invalid!("invalid dpop jwt"));
    }

    let claims = &jws.claims;
    let (Some(_jti), Some(htm), Some(htu), Some(iat), Some(ath_claim)) =
        (&claims.jti, &claims.htm, &claims.htu, claims.iat, &claims.ath)
    else {
        return Err(invalid!("invalid dpop jwt"));
    };

    if !htm.eq_ignore_ascii_case(binding.method) || htu != binding.uri {
        return Err(invalid!("invalid dpop jwt"));
    }
    if *ath_claim != ath(binding.access_token) {
        return Err(invalid!("invalid dpop jwt"));
    }

    if Utc::now().timestamp().abs_diff(iat) > config.dpop_max_age() {
        return Err(invalid!("invalid dpop jwt"));
    }

    Ok(jwk.clone())
}
