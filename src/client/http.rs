// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::sources::{Environment, IAttestationSource, IPcrHistorySource};
use crate::attestation;
use crate::policy::{self, PcrHistoryEntry, DEFAULT_DEV_HISTORY_URL, DEFAULT_PROD_HISTORY_URL};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct AttestationResponse {
    attestation_document: String,
}

/// reqwest-backed source for attestation documents and PCR history
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    api_url: String,
}

impl HttpClient {
    /// `api_url` is the enclave backend base URL; a trailing slash is
    /// ignored.  Without `timeout` requests may wait forever.
    pub fn new(api_url: &str, timeout: Option<Duration>) -> Result<Self, attestation::Error> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));

        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }

        let client = builder
            .build()
            .map_err(|e| attestation::Error::Network(e.to_string()))?;

        Ok(HttpClient {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn get_text(&self, url: &str) -> Result<String, String> {
        debug!("GET {}", url);

        let rsp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(format!("{url}: HTTP {status}"));
        }

        rsp.text().await.map_err(|e| e.to_string())
    }

    /// GET `{api_url}/health-check`
    pub async fn health_check(&self) -> Result<String, attestation::Error> {
        let url = format!("{}/health-check", self.api_url);

        self.get_text(&url)
            .await
            .map_err(attestation::Error::Network)
    }
}

pub fn default_history_url(env: Environment) -> &'static str {
    match env {
        Environment::Production => DEFAULT_PROD_HISTORY_URL,
        Environment::Development => DEFAULT_DEV_HISTORY_URL,
    }
}

#[async_trait]
impl IAttestationSource for HttpClient {
    async fn fetch_attestation_document(&self, nonce: &str) -> Result<String, attestation::Error> {
        let url = format!("{}/attestation/{}", self.api_url, nonce);

        let body = self
            .get_text(&url)
            .await
            .map_err(attestation::Error::Network)?;

        let rsp: AttestationResponse = serde_json::from_str(&body)
            .map_err(|e| attestation::Error::Network(format!("{url}: {e}")))?;

        Ok(rsp.attestation_document)
    }
}

#[async_trait]
impl IPcrHistorySource for HttpClient {
    async fn fetch_pcr_history(
        &self,
        env: Environment,
        url_override: Option<&str>,
    ) -> Result<Vec<PcrHistoryEntry>, policy::Error> {
        let url = url_override.unwrap_or_else(|| default_history_url(env));

        let body = self.get_text(url).await.map_err(policy::Error::Network)?;

        policy::parse_history(&body)
    }
}
