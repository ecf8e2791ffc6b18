// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Schema error: {field}: {reason}")]
    Schema { field: String, reason: String },
    #[error("Nonce mismatch: {0}")]
    NonceMismatch(String),
    #[error("Certificate chain error: {0}")]
    Chain(String),
    #[error("Expired certificate: {0}")]
    ExpiredCertificate(String),
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),
    #[error("PCR mismatch: {0}")]
    PcrMismatch(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl Error {
    pub(crate) fn schema(field: &str, reason: impl Into<String>) -> Self {
        Error::Schema {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Decode(e)
            | Error::NonceMismatch(e)
            | Error::Chain(e)
            | Error::ExpiredCertificate(e)
            | Error::SignatureInvalid(e)
            | Error::PcrMismatch(e)
            | Error::Network(e)
            | Error::Crypto(e) => {
                write!(f, "{}", e)
            }
            Error::Schema { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
        }
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Error::Crypto(e.to_string())
    }
}
