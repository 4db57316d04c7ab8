//! # JSON Web Encryption (JWE)
//!
//! JWE ([RFC7516]) specifies how encrypted content can be represented using
//! JSON. Every artifact minted by the issuer is a compact JWE using direct
//! symmetric key agreement (`alg` = `dir`) and AES-GCM content encryption.
//!
//! The compact form is `header..iv.ciphertext.tag`: with `dir` there is no
//! encrypted key, so the second segment is empty.
//!
//! [RFC7516]: https://www.rfc-editor.org/rfc/rfc7516

use std::fmt::{self, Display};
use std::str::FromStr;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64ct::{Base64UrlUnpadded, Encoding};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

const TAG_LEN: usize = 16;

/// Content encryption algorithm.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    /// AES-GCM with a 128-bit key
    #[serde(rename = "A128GCM")]
    A128Gcm,

    /// AES-GCM with a 256-bit key
    #[default]
    #[serde(rename = "A256GCM")]
    A256Gcm,
}

impl EncryptionAlgorithm {
    const fn key_len(self) -> usize {
        match self {
            Self::A128Gcm => 16,
            Self::A256Gcm => 32,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::A128Gcm => "A128GCM",
            Self::A256Gcm => "A256GCM",
        }
    }
}

impl Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EncryptionAlgorithm {
    type Err = JweError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A128GCM" => Ok(Self::A128Gcm),
            "A256GCM" => Ok(Self::A256Gcm),
            _ => Err(JweError::Malformed(format!("unsupported `enc`: {s}"))),
        }
    }
}

/// JWE failures. Only [`JweError::Decryption`] is recoverable by trying
/// another key.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JweError {
    /// The token is not a well-formed compact `dir` JWE.
    #[error("malformed jwe: {0}")]
    Malformed(String),

    /// The authentication tag did not verify with the supplied key.
    #[error("jwe decryption failed")]
    Decryption,

    /// Encryption failed.
    #[error("jwe encryption failed: {0}")]
    Encryption(String),
}

/// JWE protected header.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Header {
    /// Key management algorithm. Always `dir`.
    pub alg: String,

    /// Content encryption algorithm.
    pub enc: EncryptionAlgorithm,
}

/// Derive the content encryption key for `enc` from a shared secret.
fn content_key(secret: &str, enc: EncryptionAlgorithm) -> Vec<u8> {
    let mut okm = vec![0u8; enc.key_len()];
    // okm is at most 32 bytes, well within HKDF-SHA256 output limits
    let _ = Hkdf::<Sha256>::new(None, secret.as_bytes()).expand(enc.name().as_bytes(), &mut okm);
    okm
}

/// Encrypt `plaintext` with a key derived from `secret`, returning a compact
/// JWE.
///
/// # Errors
///
/// Returns [`JweError::Encryption`] if the cipher fails.
pub fn encrypt(plaintext: &[u8], secret: &str, enc: EncryptionAlgorithm) -> Result<String, JweError> {
    let header = Header {
        alg: "dir".into(),
        enc,
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|e| JweError::Encryption(e.to_string()))?;
    let aad = Base64UrlUnpadded::encode_string(&header_json);

    let key = content_key(secret, enc);
    let payload = Payload {
        msg: plaintext,
        aad: aad.as_bytes(),
    };

    let (iv, mut sealed) = match enc {
        EncryptionAlgorithm::A128Gcm => {
            let cipher = Aes128Gcm::new_from_slice(&key)
                .map_err(|e| JweError::Encryption(e.to_string()))?;
            let iv = Aes128Gcm::generate_nonce(&mut OsRng);
            let sealed =
                cipher.encrypt(&iv, payload).map_err(|e| JweError::Encryption(e.to_string()))?;
            (iv.to_vec(), sealed)
        }
        EncryptionAlgorithm::A256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(&key)
                .map_err(|e| JweError::Encryption(e.to_string()))?;
            let iv = Aes256Gcm::generate_nonce(&mut OsRng);
            let sealed =
                cipher.encrypt(&iv, payload).map_err(|e| JweError::Encryption(e.to_string()))?;
            (iv.to_vec(), sealed)
        }
    };

    // aes-gcm appends the tag to the ciphertext
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!(
        "{aad}..{}.{}.{}",
        Base64UrlUnpadded::encode_string(&iv),
        Base64UrlUnpadded::encode_string(&sealed),
        Base64UrlUnpadded::encode_string(&tag),
    ))
}

/// A parsed compact JWE, ready to be opened with one or more secrets.
#[derive(Clone, Debug)]
pub struct Jwe {
    /// Protected header.
    pub header: Header,

    aad: String,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl FromStr for Jwe {
    type Err = JweError;

    fn from_str(compact: &str) -> Result<Self, Self::Err> {
        let parts = compact.split('.').collect::<Vec<&str>>();
        if parts.len() != 5 {
            return Err(JweError::Malformed("expected 5 segments".into()));
        }
        if !parts[1].is_empty() {
            return Err(JweError::Malformed("unexpected encrypted key".into()));
        }

        let decode = |name: &str, value: &str| {
            Base64UrlUnpadded::decode_vec(value)
                .map_err(|e| JweError::Malformed(format!("issue decoding `{name}`: {e}")))
        };
        let header: Header = serde_json::from_slice(&decode("header", parts[0])?)
            .map_err(|e| JweError::Malformed(format!("issue deserializing header: {e}")))?;
        if header.alg != "dir" {
            return Err(JweError::Malformed(format!("unsupported `alg`: {}", header.alg)));
        }

        let iv = decode("iv", parts[2])?;
        if iv.len() != 12 {
            return Err(JweError::Malformed("invalid `iv` length".into()));
        }
        let mut ciphertext = decode("ciphertext", parts[3])?;
        let tag = decode("tag", parts[4])?;
        if tag.len() != TAG_LEN {
            return Err(JweError::Malformed("invalid `tag` length".into()));
        }
        ciphertext.extend_from_slice(&tag);

        Ok(Self {
            header,
            aad: parts[0].to_string(),
            iv,
            ciphertext,
        })
    }
}

impl Jwe {
    /// Decrypt with a key derived from `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`JweError::Decryption`] when the key does not authenticate
    /// the ciphertext.
    pub fn decrypt(&self, secret: &str) -> Result<Vec<u8>, JweError> {
        let key = content_key(secret, self.header.enc);
        let nonce = Nonce::from_slice(&self.iv);
        let payload = Payload {
            msg: &self.ciphertext,
            aad: self.aad.as_bytes(),
        };

        match self.header.enc {
            EncryptionAlgorithm::A128Gcm => Aes128Gcm::new_from_slice(&key)
                .map_err(|_| JweError::Decryption)?
                .decrypt(nonce, payload),
            EncryptionAlgorithm::A256Gcm => Aes256Gcm::new_from_slice(&key)
                .map_err(|_| JweError::Decryption)?
                .decrypt(nonce, payload),
        }
        .map_err(|_| JweError::Decryption)
    }
}
