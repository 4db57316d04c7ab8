//! X.509 certificate chain trust for attestation proofs.
//!
//! A presented chain (leaf first) is trusted when every certificate is within
//! its validity period, each certificate is signed by the next one in the
//! chain, and the last certificate is signed by one of the trusted roots.
//! Every issuing certificate, roots included, must be a CA allowed to sign
//! certificates. Signatures are `ecdsa-with-SHA256` over P-256.

use base64ct::{Base64, Encoding};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use x509_cert::der::asn1::ObjectIdentifier;
use x509_cert::der::oid::AssociatedOid;
use x509_cert::der::{Decode, Encode};
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages};
use x509_cert::Certificate;

const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

/// Parse an `x5c` header: base64 (not base64url) DER certificates.
///
/// # Errors
///
/// Returns an error if a certificate cannot be decoded.
pub fn parse_x5c(x5c: &[String]) -> anyhow::Result<Vec<Certificate>> {
    x5c.iter()
        .map(|b64| {
            let der = Base64::decode_vec(b64)?;
            Ok(Certificate::from_der(&der)?)
        })
        .collect()
}

/// The SEC1 encoded public key of a certificate.
#[must_use]
pub fn public_key(cert: &Certificate) -> &[u8] {
    cert.tbs_certificate.subject_public_key_info.subject_public_key.raw_bytes()
}

/// Whether `chain` (leaf first) is trusted by at least one of `roots` at
/// `now` (seconds since the Unix epoch).
#[must_use]
pub fn is_trusted(chain: &[Certificate], roots: &[Certificate], now: u64) -> bool {
    let Some(last) = chain.last() else {
        return false;
    };
    if !chain.iter().all(|cert| is_current(cert, now)) {
        return false;
    }
    if !chain.windows(2).all(|pair| is_issuer(&pair[1]) && is_signed_by(&pair[0], &pair[1])) {
        return false;
    }
    roots.iter().any(|root| is_current(root, now) && is_issuer(root) && is_signed_by(last, root))
}

// basicConstraints cA and keyUsage keyCertSign are both required
fn is_issuer(cert: &Certificate) -> bool {
    let Some(extensions) = &cert.tbs_certificate.extensions else {
        return false;
    };

    let mut ca = false;
    let mut cert_sign = false;
    for ext in extensions {
        let value = ext.extn_value.as_bytes();
        if ext.extn_id == BasicConstraints::OID {
            ca = BasicConstraints::from_der(value).is_ok_and(|bc| bc.ca);
        } else if ext.extn_id == KeyUsage::OID {
            cert_sign =
                KeyUsage::from_der(value).is_ok_and(|ku| ku.0.contains(KeyUsages::KeyCertSign));
        }
    }
    ca && cert_sign
}

fn is_current(cert: &Certificate, now: u64) -> bool {
    let validity = &cert.tbs_certificate.validity;
    validity.not_before.to_unix_duration().as_secs() <= now
        && now <= validity.not_after.to_unix_duration().as_secs()
}

fn is_signed_by(cert: &Certificate, issuer: &Certificate) -> bool {
    if cert.tbs_certificate.issuer != issuer.tbs_certificate.subject {
        return false;
    }
    if cert.signature_algorithm.oid != ECDSA_WITH_SHA256 {
        return false;
    }

    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key(issuer)) else {
        return false;
    };
    let Some(sig_der) = cert.signature.as_bytes() else {
        return false;
    };
    let Ok(signature) = Signature::from_der(sig_der) else {
        return false;
    };
    let Ok(tbs) = cert.tbs_certificate.to_der() else {
        return false;
    };
    key.verify(&tbs, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};

    use super::*;

    struct Ca {
        cert: rcgen::Certificate,
        key: KeyPair,
    }

    fn ca(name: &str) -> Ca {
        let key = KeyPair::generate().expect("should generate key");
        let mut params = CertificateParams::new(vec![]).expect("should create params");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        params.distinguished_name.push(DnType::CommonName, name);
        let cert = params.self_signed(&key).expect("should self-sign");
        Ca { cert, key }
    }

    fn issue(name: &str, issuer: &Ca) -> (rcgen::Certificate, KeyPair) {
        let key = KeyPair::generate().expect("should generate key");
        let mut params = CertificateParams::new(vec![]).expect("should create params");
        params.distinguished_name.push(DnType::CommonName, name);
        let cert = params.signed_by(&key, &issuer.cert, &issuer.key).expect("should sign");
        (cert, key)
    }

    fn parsed(cert: &rcgen::Certificate) -> Certificate {
        Certificate::from_der(cert.der()).expect("should parse")
    }

    const NOW: u64 = 1_767_225_600;

    #[test]
    fn leaf_signed_by_root() {
        let root = ca("Root");
        let (leaf, _) = issue("Wallet", &root);
        assert!(is_trusted(&[parsed(&leaf)], &[parsed(&root.cert)], NOW));
    }

    #[test]
    fn through_intermediate() {
        let root = ca("Root");
        let intermediate = ca("Intermediate");
        let mut params = CertificateParams::new(vec![]).expect("params");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        params.distinguished_name.push(DnType::CommonName, "Intermediate");
        let intermediate_cert =
            params.signed_by(&intermediate.key, &root.cert, &root.key).expect("should sign");
        let intermediate = Ca {
            cert: intermediate_cert,
            key: intermediate.key,
        };
        let (leaf, _) = issue("Wallet", &intermediate);

        let chain = [parsed(&leaf), parsed(&intermediate.cert)];
        assert!(is_trusted(&chain, &[parsed(&root.cert)], NOW));
        assert!(!is_trusted(&chain[..1], &[parsed(&root.cert)], NOW));
    }

    #[test]
    fn issued_by_end_entity() {
        let root = ca("Root");
        let (leaf, leaf_key) = issue("Wallet", &root);
        let leaf = Ca {
            cert: leaf,
            key: leaf_key,
        };
        let (forged, _) = issue("Forged", &leaf);

        let chain = [parsed(&forged), parsed(&leaf.cert)];
        assert!(!is_trusted(&chain, &[parsed(&root.cert)], NOW));
    }

    #[test]
    fn issuer_without_cert_sign() {
        let root = ca("Root");
        let key = KeyPair::generate().expect("should generate key");
        let mut params = CertificateParams::new(vec![]).expect("params");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.distinguished_name.push(DnType::CommonName, "Intermediate");
        let cert = params.signed_by(&key, &root.cert, &root.key).expect("should sign");
        let intermediate = Ca { cert, key };
        let (leaf, _) = issue("Wallet", &intermediate);

        let chain = [parsed(&leaf), parsed(&intermediate.cert)];
        assert!(!is_trusted(&chain, &[parsed(&root.cert)], NOW));
    }

    #[test]
    fn root_must_be_ca() {
        let key = KeyPair::generate().expect("should generate key");
        let mut params = CertificateParams::new(vec![]).expect("params");
        params.is_ca = IsCa::ExplicitNoCa;
        params.distinguished_name.push(DnType::CommonName, "Root");
        let cert = params.self_signed(&key).expect("should self-sign");
        let root = Ca { cert, key };
        let (leaf, _) = issue("Wallet", &root);

        assert!(!is_trusted(&[parsed(&leaf)], &[parsed(&root.cert)], NOW));
    }

    #[test]
    fn untrusted_root() {
        let root = ca("Root");
        let rogue = ca("Root");
        let (leaf, _) = issue("Wallet", &rogue);
        assert!(!is_trusted(&[parsed(&leaf)], &[parsed(&root.cert)], NOW));
    }

    #[test]
    fn any_root_suffices() {
        let root = ca("Root");
        let other = ca("Other");
        let (leaf, _) = issue("Wallet", &root);
        assert!(is_trusted(&[parsed(&leaf)], &[parsed(&other.cert), parsed(&root.cert)], NOW));
    }

    #[test]
    fn empty_chain() {
        let root = ca("Root");
        assert!(!is_trusted(&[], &[parsed(&root.cert)], NOW));
    }

    #[test]
    fn x5c_roundtrip() {
        let root = ca("Root");
        let x5c = vec![Base64::encode_string(root.cert.der())];
        let certs = parse_x5c(&x5c).expect("should parse");
        assert_eq!(certs[0], parsed(&root.cert));
        assert!(parse_x5c(&["not base64!".into()]).is_err());
    }
}
