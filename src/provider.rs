//! # Provider
//!
//! Collaborators the issuer relies on but does not implement: the data
//! operations that produce credential subject claims, and QR code rendering
//! for credential offers.

use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::CredentialConfiguration;

/// Issuer Provider trait.
pub trait Provider: Subject + Render + Clone {}

/// Credential subject information returned by [`Subject::dataset`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Dataset {
    /// The credential subject populated for the user.
    pub claims: Map<String, Value>,

    /// Specifies whether user information required for the credential subject
    /// is pending.
    pub pending: bool,
}

/// The Subject trait specifies how the library expects issuance subject (user)
/// information to be provided by implementers.
pub trait Subject: Send + Sync {
    /// Returns a populated `Dataset` object for the given subject (holder) and
    /// credential configuration.
    fn dataset(
        &self, subject_id: &str, configuration: &CredentialConfiguration,
    ) -> impl Future<Output = Result<Dataset>> + Send;
}

/// Renders credential offer QR codes.
pub trait Render: Send + Sync {
    /// Render `data` as a QR code image, returned as a data URL.
    fn qrcode(&self, data: &str) -> impl Future<Output = Result<String>> + Send;
}
