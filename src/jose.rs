//! # JOSE
//!
//! JSON Object Signing and Encryption primitives used by the issuer: JWS for
//! DPoP proofs, holder-binding proofs, credentials and signed metadata; JWE
//! for the encrypted artifacts that carry protocol state; JWK for the keys
//! exchanged in both.

pub mod jwe;
pub mod jwk;
pub mod jws;

pub use jwk::PublicKeyJwk;
pub use jws::{Algorithm, Signer};
