//! # Protocol Errors
//!
//! Every protocol failure raised by the issuance pipelines is an [`Error`].
//! Statements return it immediately and the [`crate::Issuer`] boundary
//! converts it to the wire shape ([`ErrorResponse`]), optionally enriched with
//! request context for business-event logging.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// OAuth 2.0 / `OpenID4VCI` error codes raised by the issuing engine.
#[derive(Error, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Error {
    /// The request is missing a required parameter, includes an unsupported
    /// parameter value (grant type, proof type), or is otherwise malformed.
    /// Malformed DPoP and holder-binding proofs are reported here too.
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Client authentication failed: unknown client, wrong secret,
    /// unregistered redirect URI, or an artifact bound to another client.
    #[error("invalid_client: {0}")]
    InvalidClient(String),

    /// No credential configuration exists for the request.
    #[error("invalid_credential: {0}")]
    InvalidCredential(String),

    /// Deferred issuance is still pending. The Wallet should retry after the
    /// interval returned with the transaction.
    #[error("issuance_pending: {0}")]
    IssuancePending(String),

    /// The deferred `transaction_id` was not issued by this issuer, has
    /// expired, or belongs to another client.
    #[error("invalid_transaction_id: {0}")]
    InvalidTransactionId(String),

    /// Unexpected failure while generating a token or credential.
    #[error("unknown_error: {0}")]
    UnknownError(String),
}

impl Error {
    /// HTTP status the error maps to.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::IssuancePending(_) | Self::InvalidTransactionId(_) => {
                400
            }
            Self::InvalidClient(_) => 401,
            Self::InvalidCredential(_) => 404,
            Self::UnknownError(_) => 500,
        }
    }

    /// OAuth error code string.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidCredential(_) => "invalid_credential",
            Self::IssuancePending(_) => "issuance_pending",
            Self::InvalidTransactionId(_) => "invalid_transaction_id",
            Self::UnknownError(_) => "unknown_error",
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::InvalidRequest(d)
            | Self::InvalidClient(d)
            | Self::InvalidCredential(d)
            | Self::IssuancePending(d)
            | Self::InvalidTransactionId(d)
            | Self::UnknownError(d) => d,
        }
    }

    /// Transform the error into its wire representation.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status: self.status(),
            error: self.code().to_string(),
            error_description: self.description().to_string(),
            data: Map::new(),
        }
    }
}

/// Error response returned to the caller.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// HTTP status code. Carried in the HTTP status line, not the body.
    #[serde(skip)]
    pub status: u16,

    /// Error code.
    pub error: String,

    /// Error description.
    pub error_description: String,

    /// Request context attached for logging. Never sent to the caller.
    #[serde(skip)]
    pub data: Map<String, Value>,
}

impl ErrorResponse {
    /// Attach a request-context field for business-event logging.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Render the error as a query string, for redirect-style error responses.
    #[must_use]
    pub fn to_querystring(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("error", &self.error)
            .append_pair("error_description", &self.error_description)
            .finish()
    }

    /// Transform the response to JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> Self {
        err.to_response()
    }
}

/// Construct an `invalid_request` error with a formatted description.
macro_rules! invalid {
    ($($arg:tt)*) => {
        $crate::Error::InvalidRequest(format!($($arg)*))
    };
}

/// Construct an `invalid_client` error with a formatted description.
macro_rules! client {
    ($($arg:tt)*) => {
        $crate::Error::InvalidClient(format!($($arg)*))
    };
}

/// Construct an `unknown_error` error with a formatted description.
macro_rules! server {
    ($($arg:tt)*) => {
        $crate::Error::UnknownError(format!($($arg)*))
    };
}

pub(crate) use {client, invalid, server};
