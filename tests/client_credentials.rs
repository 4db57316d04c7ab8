//! Client credentials flow, with holder binding by JWT and attestation
//! proofs.

mod utils;

use std::collections::BTreeMap;

use oid4vci_issuer::types::{CredentialRequest, SingleProof, TokenRequest};
use oid4vci_issuer::Issuer;
use rstest::rstest;
use serde_json::Value;
use utils::{
    provider, Holder, ProviderImpl, WalletProvider, CREDENTIAL_URI, SERVICE_ID, SERVICE_SECRET,
};

fn service_token(issuer: &Issuer<ProviderImpl>) -> String {
    let request = TokenRequest {
        grant_type: "client_credentials".into(),
        client_id: Some(SERVICE_ID.into()),
        client_secret: Some(SERVICE_SECRET.into()),
        scope: Some("identity".into()),
        ..TokenRequest::default()
    };
    let response = issuer.token(request).expect("should issue token");
    assert_eq!(response.expires_in, 3600);
    response.access_token
}

#[rstest]
#[tokio::test]
async fn jwt_proof(provider: ProviderImpl) {
    utils::init_tracer();
    let issuer = utils::issuer(provider, &WalletProvider::new("Root"));
    let holder = Holder::new();
    let access_token = service_token(&issuer);

    let c_nonce = issuer.nonce().expect("nonce").c_nonce;
    let request = CredentialRequest {
        credential_configuration_id: Some("Identity_SD_JWT".into()),
        proof: Some(SingleProof {
            proof_type: "jwt".into(),
            jwt: Some(holder.jwt_proof(&c_nonce)),
            attestation: None,
        }),
        ..CredentialRequest::default()
    };

    let response = issuer
        .credential(&holder.http(CREDENTIAL_URI, &access_token), request)
        .await
        .expect("should issue");
    assert_eq!(response.credentials.map(|c| c.len()), Some(1));
}

#[rstest]
#[tokio::test]
async fn trusted_attestation(provider: ProviderImpl) {
    utils::init_tracer();
    let wallet_provider = WalletProvider::new("Wallet Provider");
    let issuer = utils::issuer(provider, &wallet_provider);
    let holder = Holder::new();
    let access_token = service_token(&issuer);

    let c_nonce = issuer.nonce().expect("nonce").c_nonce;
    let (first, _) = wallet_provider.attest(&c_nonce);
    let (second, _) = wallet_provider.attest(&c_nonce);
    let request = CredentialRequest {
        credential_configuration_id: Some("Identity_SD_JWT".into()),
        proofs: Some(BTreeMap::from([("attestation".to_string(), vec![first, second])])),
        ..CredentialRequest::default()
    };

    let response = issuer
        .credential(&holder.http(CREDENTIAL_URI, &access_token), request)
        .await
        .expect("should issue");
    assert_eq!(response.credentials.map(|c| c.len()), Some(2));
}

#[rstest]
#[tokio::test]
async fn untrusted_attestation(provider: ProviderImpl) {
    utils::init_tracer();
    let issuer = utils::issuer(provider, &WalletProvider::new("Trusted"));
    let rogue = WalletProvider::new("Rogue");
    let holder = Holder::new();
    let access_token = service_token(&issuer);

    let c_nonce = issuer.nonce().expect("nonce").c_nonce;
    let (proof, _) = rogue.attest(&c_nonce);
    let request = CredentialRequest {
        credential_configuration_id: Some("Identity_SD_JWT".into()),
        proofs: Some(BTreeMap::from([("attestation".to_string(), vec![proof])])),
        ..CredentialRequest::default()
    };

    let err = issuer
        .credential(&holder.http(CREDENTIAL_URI, &access_token), request)
        .await
        .expect_err("should fail");
    assert_eq!(err.error, "invalid_request");
    assert_eq!(err.error_description, "x509 certificate chain not trusted");
    assert_eq!(
        err.data.get("credential_configuration_ids"),
        Some(&Value::from(vec!["Identity_SD_JWT"]))
    );
}

#[rstest]
#[tokio::test]
async fn dpop_bound_to_request(provider: ProviderImpl) {
    utils::init_tracer();
    let issuer = utils::issuer(provider, &WalletProvider::new("Root"));
    let holder = Holder::new();
    let access_token = service_token(&issuer);
    let c_nonce = issuer.nonce().expect("nonce").c_nonce;

    // proof for another endpoint
    let mut http = holder.http("https://issuer.example/nonce", &access_token);
    http.uri = CREDENTIAL_URI.into();
    let request = holder.credential_request(&["Identity_SD_JWT"], &c_nonce);
    let err = issuer.credential(&http, request).await.expect_err("should fail");
    assert_eq!(err.error_description, "invalid dpop jwt");

    // proof repeated
    let mut http = holder.http(CREDENTIAL_URI, &access_token);
    http.dpop.push(http.dpop[0].clone());
    let request = holder.credential_request(&["Identity_SD_JWT"], &c_nonce);
    let err = issuer.credential(&http, request).await.expect_err("should fail");
    assert_eq!(err.error_description, "multiple dpop jwts");
}

#[rstest]
#[tokio::test]
async fn wrong_secret(provider: ProviderImpl) {
    utils::init_tracer();
    let issuer = utils::issuer(provider, &WalletProvider::new("Root"));

    let request = TokenRequest {
        grant_type: "client_credentials".into(),
        client_id: Some(SERVICE_ID.into()),
        client_secret: Some("guess".into()),
        ..TokenRequest::default()
    };
    let err = issuer.token(request).expect_err("should fail");
    assert_eq!(err.status, 401);
    assert_eq!(err.error, "invalid_client");
    assert_eq!(err.data.get("grant_type"), Some(&Value::from("client_credentials")));
}

#[rstest]
#[tokio::test]
async fn shared_secret_nonce(provider: ProviderImpl) {
    utils::init_tracer();
    let issuer = utils::issuer(provider, &WalletProvider::new("Root"));
    let other = utils::issuer(ProviderImpl::new(), &WalletProvider::new("Root"));
    let holder = Holder::new();
    let access_token = service_token(&issuer);

    // same secret, so another instance's nonce is accepted
    let c_nonce = other.nonce().expect("nonce").c_nonce;
    let request = holder.credential_request(&["Identity_SD_JWT"], &c_nonce);
    assert!(issuer.credential(&holder.http(CREDENTIAL_URI, &access_token), request).await.is_ok());

    // an access token is not a nonce
    let request = holder.credential_request(&["Identity_SD_JWT"], &access_token);
    let err = issuer
        .credential(&holder.http(CREDENTIAL_URI, &access_token), request)
        .await
        .expect_err("should fail");
    assert_eq!(err.error_description, "jwt proof #0 nonce is invalid");
}
