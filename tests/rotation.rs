//! Secret rotation across live tokens.

mod utils;

use std::time::Duration;

use oid4vci_issuer::codec::{derive, Nonce};
use oid4vci_issuer::config::{SecretConfig, TokenConfig};
use oid4vci_issuer::Issuer;
use utils::{ProviderImpl, WalletProvider};

fn rotating(ttl: u64) -> Issuer<ProviderImpl> {
    let mut config = utils::config(&WalletProvider::new("Root"));
    config.secret = SecretConfig {
        base_secret: "rotation-base".into(),
        rotation_enabled: true,
        rotation_ttl: ttl,
        ..SecretConfig::default()
    };
    Issuer::new(config, ProviderImpl::new()).expect("should configure")
}

#[tokio::test(start_paused = true)]
async fn tokens_survive_rotation() {
    utils::init_tracer();
    let issuer = rotating(3600);
    let counter = issuer.settings().rotation().expect("rotation").counter;
    let c_nonce = issuer.nonce().expect("nonce").c_nonce;

    let handle = issuer.start_rotation().expect("rotation enabled");
    tokio::time::sleep(Duration::from_secs(2 * 3600 + 1)).await;

    let ring = issuer.settings().codec().secrets().snapshot();
    assert_ne!(ring.secret, derive("rotation-base", counter));
    assert!(ring.iter().any(|s| s == derive("rotation-base", counter)));

    // sealed with a secret now in the previous list
    let nonce = issuer.settings().codec().decode::<Nonce>(&c_nonce).expect("should decode");
    assert_eq!(nonce.sub, "issuer");

    handle.stop().await;
}

#[tokio::test]
async fn static_secret_does_not_rotate() {
    let issuer = utils::issuer(ProviderImpl::new(), &WalletProvider::new("Root"));
    assert!(issuer.start_rotation().is_none());
}

#[tokio::test(start_paused = true)]
async fn single_scheduler_across_clones() {
    let issuer = rotating(3600);
    let clone = issuer.clone();

    let handle = issuer.start_rotation().expect("rotation enabled");
    assert!(clone.start_rotation().is_none());
    handle.stop().await;

    let handle = clone.start_rotation().expect("restart after stop");
    handle.stop().await;
}
