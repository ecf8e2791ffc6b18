// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::attestation;
use crate::policy;
use crate::policy::PcrHistoryEntry;
use async_trait::async_trait;

/// Which remote PCR history to consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Production,
    Development,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Development => f.write_str("development"),
        }
    }
}

#[async_trait]
pub trait IAttestationSource: Send + Sync {
    /// Obtain a fresh base64 attestation document bound to `nonce`
    async fn fetch_attestation_document(&self, nonce: &str) -> Result<String, attestation::Error>;
}

#[async_trait]
pub trait IPcrHistorySource: Send + Sync {
    /// Fetch the signed PCR history of `env`, from `url_override` when given
    async fn fetch_pcr_history(
        &self,
        env: Environment,
        url_override: Option<&str>,
    ) -> Result<Vec<PcrHistoryEntry>, policy::Error>;
}
