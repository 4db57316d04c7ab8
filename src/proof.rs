//! # Holder Binding Proofs
//!
//! A credential request carries one or more proofs that the Wallet controls
//! the key a credential is to be bound to. Two proof types are accepted:
//!
//! - `jwt`: a JWS of type `openid4vci-proof+jwt` signed by the key in its own
//!   `jwk` header.
//! - `attestation`: a JWS signed by the leaf certificate of its `x5c` header,
//!   where the chain must lead to a trusted root.
//!
//! Both must carry a `nonce` claim holding a `c_nonce` minted by this issuer,
//! which binds the proof to this issuer and limits its replay to the nonce's
//! lifetime.
//!
//! Errors are indexed by position so batch submissions can be diagnosed.

pub mod x509;

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::codec::Nonce;
use crate::config::{ClientsConfig, TokenConfig, TrustConfig};
use crate::error::invalid;
use crate::jose::jws::Jws;
use crate::jose::PublicKeyJwk;
use crate::Result;

const JWT_PROOF_TYPE: &str = "openid4vci-proof+jwt";

#[derive(Deserialize)]
struct ProofClaims {
    nonce: Option<String>,
}

/// Verify every submitted proof, returning the holder keys in submission
/// order (by proof type, then position).
///
/// # Errors
///
/// Returns `invalid_request` for an unknown proof type or the first proof
/// that fails verification.
pub fn verify(
    proofs: &BTreeMap<String, Vec<String>>,
    config: &(impl ClientsConfig + TokenConfig + TrustConfig),
) -> Result<Vec<PublicKeyJwk>> {
    tracing::debug!("proof::verify");

    let mut keys = vec![];
    for (proof_type, list) in proofs {
        for (i, proof) in list.iter().enumerate() {
            let key = match proof_type.as_str() {
                "jwt" => verify_jwt(i, proof, config)?,
                "attestation" => verify_attestation(i, proof, config)?,
                _ => return Err(invalid!("unknown proof type")),
            };
            keys.push(key);
        }
    }
    Ok(keys)
}

fn verify_jwt(
    index: usize, proof: &str, config: &(impl ClientsConfig + TokenConfig),
) -> Result<PublicKeyJwk> {
    let Ok(jws) = Jws::<ProofClaims>::decode(proof) else {
        return Err(invalid!("jwt proof #{index} is invalid"));
    };
    let Some(jwk) = &jws.header.jwk else {
        return Err(invalid!("jwt proof #{index} jwk is missing"));
    };
    if jws.header.typ.as_deref() != Some(JWT_PROOF_TYPE) {
        return Err(invalid!("jwt proof #{index} typ is invalid"));
    }
    if jws.verify(jwk).is_err() {
        return Err(invalid!("jwt proof #{index} is invalid"));
    }
    if !nonce_is_valid(jws.claims.nonce.as_deref(), config) {
        return Err(invalid!("jwt proof #{index} nonce is invalid"));
    }

    Ok(jwk.clone())
}

fn verify_attestation(
    index: usize, proof: &str, config: &(impl ClientsConfig + TokenConfig + TrustConfig),
) -> Result<PublicKeyJwk> {
    let Ok(jws) = Jws::<ProofClaims>::decode(proof) else {
        return Err(invalid!("attestation proof #{index} is invalid"));
    };
    let Some(x5c) = &jws.header.x5c else {
        return Err(invalid!("attestation proof #{index} x5c is missing"));
    };
    let Ok(chain) = x509::parse_x5c(x5c) else {
        return Err(invalid!("attestation proof #{index} x5c is invalid"));
    };

    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    if !x509::is_trusted(&chain, config.trusted_roots(), now) {
        return Err(invalid!("x509 certificate chain not trusted"));
    }

    // is_trusted guarantees a non-empty chain
    let Some(leaf) = chain.first() else {
        return Err(invalid!("attestation proof #{index} x5c is missing"));
    };
    let Ok(jwk) = PublicKeyJwk::from_p256_sec1(x509::public_key(leaf)) else {
        return Err(invalid!("attestation proof #{index} key is unsupported"));
    };
    if jws.verify(&jwk).is_err() {
        return Err(invalid!("attestation proof #{index} is invalid"));
    }
    if !nonce_is_valid(jws.claims.nonce.as_deref(), config) {
        return Err(invalid!("attestation proof #{index} nonce is invalid"));
    }

    Ok(jwk)
}

/// A proof nonce must be a live `c_nonce` issued to the issuer client.
fn nonce_is_valid(nonce: Option<&str>, config: &(impl ClientsConfig + TokenConfig)) -> bool {
    let Some(nonce) = nonce else {
        return false;
    };
    config
        .codec()
        .decode::<Nonce>(nonce)
        .is_ok_and(|n| n.sub == config.clients().issuer().id)
}
