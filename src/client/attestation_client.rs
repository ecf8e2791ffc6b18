// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::http::HttpClient;
use super::sources::IAttestationSource;
use crate::attestation::{AttestationDocument, CoseEnvelope, Error, LocalDocument, Verifier};
use log::{info, warn};
use std::time::Duration;

/// Backends that serve unsigned development documents
pub const LOCAL_ENDPOINTS: [&str; 3] = [
    "http://127.0.0.1:3000",
    "http://localhost:3000",
    "http://0.0.0.0:3000",
];

/// Exact match only: no prefix, port or trailing slash tolerance
pub fn is_local_endpoint(api_url: &str) -> bool {
    LOCAL_ENDPOINTS.contains(&api_url)
}

/// Outcome of `verify_attestation`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attestation {
    /// Fully authenticated enclave document
    Enclave(AttestationDocument),
    /// Local development backend, nothing was verified
    Local { public_key: Option<Vec<u8>> },
}

impl Attestation {
    pub fn public_key(&self) -> Option<&[u8]> {
        match self {
            Attestation::Enclave(d) => d.public_key.as_deref(),
            Attestation::Local { public_key } => public_key.as_deref(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Attestation::Local { .. })
    }
}

/// Result of a successful handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub nonce: String,
    pub attestation: Attestation,
    pub server_public_key: Vec<u8>,
}

pub struct AttestationClient<A> {
    source: A,
    api_url: String,
    verifier: Verifier,
}

impl AttestationClient<HttpClient> {
    /// HTTP client for `api_url`, trusting the bundled AWS root
    pub fn connect(api_url: &str, timeout: Option<Duration>) -> Result<Self, Error> {
        let source = HttpClient::new(api_url, timeout)?;

        Ok(Self::new(source, api_url, Verifier::aws()?))
    }

    pub async fn health_check(&self) -> Result<String, Error> {
        self.source.health_check().await
    }
}

impl<A: IAttestationSource> AttestationClient<A> {
    pub fn new(source: A, api_url: &str, verifier: Verifier) -> Self {
        AttestationClient {
            source,
            api_url: api_url.to_string(),
            verifier,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Fetch a document bound to `nonce` and authenticate it.  Against one
    /// of [`LOCAL_ENDPOINTS`] the document is only decoded.
    pub async fn verify_attestation(&self, nonce: &str) -> Result<Attestation, Error> {
        let document = self.source.fetch_attestation_document(nonce).await?;

        if is_local_endpoint(&self.api_url) {
            warn!(
                "{} is a local development backend, skipping attestation checks",
                self.api_url
            );

            let envelope = CoseEnvelope::from_base64(&document)?;
            let local = LocalDocument::decode(&envelope.payload)?;

            return Ok(Attestation::Local {
                public_key: local.public_key,
            });
        }

        let doc = self.verifier.authenticate(&document, nonce)?;

        info!("attested enclave {}", doc.module_id);

        Ok(Attestation::Enclave(doc))
    }

    /// Attest with a fresh random nonce and return the enclave's public key
    pub async fn handshake(&self) -> Result<Handshake, Error> {
        let nonce = uuid::Uuid::new_v4().to_string();

        let attestation = self.verify_attestation(&nonce).await?;

        let server_public_key = attestation
            .public_key()
            .map(|k| k.to_vec())
            .ok_or_else(|| Error::Schema {
                field: "public_key".to_string(),
                reason: "attestation carries no public key".to_string(),
            })?;

        Ok(Handshake {
            nonce,
            attestation,
            server_public_key,
        })
    }
}
