//! # Token Codec
//!
//! All protocol state lives inside self-contained encrypted artifacts: the
//! `request_uri`, authorization code, access token, `c_nonce`, issuer state
//! and deferred transaction handle. Each is a compact JWE (`alg` = `dir`)
//! whose payload carries a `token_type` discriminant plus `iat` and `exp`.
//!
//! Decryption tries the current secret first and falls back through the
//! previous secrets in the ring. Only an authentication failure moves on to
//! the next secret: a malformed token, an unexpected `token_type` or an
//! expired token fails immediately.

pub mod artifact;
pub mod rotation;
pub mod secret;

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use self::artifact::{
    AccessToken, Artifact, AuthorizationCode, AuthorizationRequest, IssuerState, Nonce,
    Transaction,
};
pub use self::rotation::RotationHandle;
pub use self::secret::{derive, SecretRing, SecretStore};
use crate::jose::jwe::{self, EncryptionAlgorithm, Jwe, JweError};

/// Token codec failures. Statements map these to protocol errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// Not a well-formed artifact.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// No secret in the ring authenticates the token.
    #[error("token cannot be decrypted")]
    Undecryptable,

    /// The token decrypted but carries another artifact type.
    #[error("expected {expected} token, found {found}")]
    WrongType {
        /// Expected discriminant.
        expected: &'static str,
        /// Discriminant found in the payload.
        found: String,
    },

    /// The token is past its `exp`.
    #[error("token has expired")]
    Expired,

    /// The artifact could not be serialized or encrypted.
    #[error("issue encoding token: {0}")]
    Encode(String),
}

#[derive(Serialize)]
struct Sealed<'a, A> {
    token_type: &'static str,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    artifact: &'a A,
}

#[derive(Deserialize)]
struct Opened {
    token_type: String,
    exp: i64,
    #[serde(flatten)]
    claims: Map<String, Value>,
}

/// Encrypts and decrypts artifacts with the shared [`SecretRing`].
#[derive(Clone, Debug)]
pub struct TokenCodec {
    secrets: Arc<SecretStore>,
    enc: EncryptionAlgorithm,
}

impl TokenCodec {
    /// Create a codec reading secrets from `secrets`.
    #[must_use]
    pub const fn new(secrets: Arc<SecretStore>, enc: EncryptionAlgorithm) -> Self {
        Self { secrets, enc }
    }

    /// The shared secret store.
    #[must_use]
    pub const fn secrets(&self) -> &Arc<SecretStore> {
        &self.secrets
    }

    /// Encrypt `artifact` with the current secret, valid for `ttl` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the artifact cannot be serialized or
    /// encrypted.
    pub fn encode<A: Artifact>(&self, artifact: &A, ttl: u64) -> Result<String, CodecError> {
        let iat = Utc::now().timestamp();
        let exp = iat.saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX));
        let sealed = Sealed {
            token_type: A::TOKEN_TYPE,
            iat,
            exp,
            artifact,
        };
        let plaintext = serde_json::to_vec(&sealed).map_err(|e| CodecError::Encode(e.to_string()))?;

        let ring = self.secrets.snapshot();
        jwe::encrypt(&plaintext, &ring.secret, self.enc).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decrypt `token` and check it is an `A` artifact that has not expired.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] describing the first terminal failure.
    pub fn decode<A: Artifact>(&self, token: &str) -> Result<A, CodecError> {
        let opened: Opened = self.open(token)?;

        if opened.token_type != A::TOKEN_TYPE {
            return Err(CodecError::WrongType {
                expected: A::TOKEN_TYPE,
                found: opened.token_type,
            });
        }
        if opened.exp <= Utc::now().timestamp() {
            return Err(CodecError::Expired);
        }

        serde_json::from_value(Value::Object(opened.claims))
            .map_err(|e| CodecError::Malformed(format!("issue deserializing claims: {e}")))
    }

    fn open<T: DeserializeOwned>(&self, token: &str) -> Result<T, CodecError> {
        let jwe: Jwe = token.parse().map_err(|e: JweError| CodecError::Malformed(e.to_string()))?;

        let ring = self.secrets.snapshot();
        for secret in ring.iter() {
            match jwe.decrypt(secret) {
                Ok(plaintext) => {
                    return serde_json::from_slice(&plaintext)
                        .map_err(|e| CodecError::Malformed(format!("issue deserializing payload: {e}")));
                }
                Err(JweError::Decryption) => continue,
                Err(e) => return Err(CodecError::Malformed(e.to_string())),
            }
        }

        Err(CodecError::Undecryptable)
    }
}

#[cfg(test)]
mod tests {
    use assert_let_bind::assert_let;

    use super::*;
    use crate::codec::secret::MAX_PREVIOUS;

    fn codec(secret: &str) -> TokenCodec {
        let store = SecretStore::new(SecretRing::new(secret, vec![]));
        TokenCodec::new(Arc::new(store), EncryptionAlgorithm::A256Gcm)
    }

    fn nonce() -> Nonce {
        Nonce {
            sub: "issuer".into(),
        }
    }

    #[test]
    fn roundtrip() {
        let codec = codec("secret");
        let token = codec.encode(&nonce(), 60).expect("should encode");
        assert_eq!(codec.decode::<Nonce>(&token).expect("should decode"), nonce());
    }

    #[test]
    fn previous_secret_fallback() {
        let codec = codec(&derive("base", 0));
        let token = codec.encode(&nonce(), 60).expect("should encode");

        codec.secrets().rotate(&derive("base", 1));
        assert_eq!(codec.decode::<Nonce>(&token).expect("should decode"), nonce());

        for counter in 2..=u64::try_from(MAX_PREVIOUS).expect("fits") {
            codec.secrets().rotate(&derive("base", counter));
        }
        assert!(codec.decode::<Nonce>(&token).is_ok(), "oldest secret still in ring");

        codec.secrets().rotate(&derive("base", 11));
        assert_eq!(codec.decode::<Nonce>(&token), Err(CodecError::Undecryptable));
    }

    #[test]
    fn unknown_secret() {
        let token = codec("one").encode(&nonce(), 60).expect("should encode");
        assert_eq!(codec("two").decode::<Nonce>(&token), Err(CodecError::Undecryptable));
    }

    #[test]
    fn discriminant_enforced() {
        let codec = codec("secret");
        let token = codec.encode(&nonce(), 60).expect("should encode");

        assert_let!(Err(CodecError::WrongType { expected, found }), codec.decode::<IssuerState>(&token));
        assert_eq!(expected, "issuer_state");
        assert_eq!(found, "c_nonce");
    }

    #[test]
    fn expired() {
        let codec = codec("secret");
        let token = codec.encode(&nonce(), 0).expect("should encode");
        assert_eq!(codec.decode::<Nonce>(&token), Err(CodecError::Expired));
    }

    #[test]
    fn malformed_is_terminal() {
        let codec = codec("secret");
        assert_let!(Err(CodecError::Malformed(_)), codec.decode::<Nonce>("not-a-token"));
    }
}
