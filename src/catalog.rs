//! # Credential Catalog
//!
//! The credential configurations the issuer supports, indexed by
//! configuration id and by scope. Entries are read-only once the issuer is
//! built.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A supported credential configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialConfiguration {
    /// Identifier the Wallet uses in credential requests.
    pub credential_configuration_id: String,

    /// Scope authorizing issuance of this credential.
    pub scope: String,

    /// Credential format, e.g. `vc+sd-jwt`.
    pub format: String,

    /// SD-JWT verifiable credential type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vct: Option<String>,

    /// ISO mDL document type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctype: Option<String>,

    /// Language-based display properties.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub display: Vec<CredentialDisplay>,

    /// Issued through the deferred credential endpoint.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deferred: bool,
}

/// Language-based display properties of a credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialDisplay {
    /// Display name for the locale.
    pub name: String,

    /// A BCP47 [RFC5646] language tag.
    ///
    /// [RFC5646]: (https://www.rfc-editor.org/rfc/rfc5646)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Description of the credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Background color (CSS color value).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,

    /// Text color (CSS color value).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

/// Catalog of supported credential configurations.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    configurations: Vec<CredentialConfiguration>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    /// Index the configurations. Later duplicates of an id are ignored.
    #[must_use]
    pub fn new(configurations: Vec<CredentialConfiguration>) -> Self {
        let mut by_id = HashMap::new();
        for (i, config) in configurations.iter().enumerate() {
            by_id.entry(config.credential_configuration_id.clone()).or_insert(i);
        }
        Self {
            configurations,
            by_id,
        }
    }

    /// Configuration by id.
    #[must_use]
    pub fn get(&self, credential_configuration_id: &str) -> Option<&CredentialConfiguration> {
        self.by_id.get(credential_configuration_id).map(|&i| &self.configurations[i])
    }

    /// Configurations authorized by `scope`.
    pub fn by_scope<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a CredentialConfiguration> {
        self.configurations.iter().filter(move |c| c.scope == scope)
    }

    /// All configurations, in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &CredentialConfiguration> {
        self.configurations.iter()
    }
}
