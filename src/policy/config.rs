// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROD_HISTORY_URL: &str =
    "https://raw.githubusercontent.com/OpenSecretCloud/opensecret/master/pcrProdHistory.json";
pub const DEFAULT_DEV_HISTORY_URL: &str =
    "https://raw.githubusercontent.com/OpenSecretCloud/opensecret/master/pcrDevHistory.json";

fn default_remote_attestation() -> bool {
    true
}

/// Caller policy for PCR0 validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcrConfig {
    /// extra known good production PCR0 values (hex)
    #[serde(default, rename = "pcr0-values", skip_serializing_if = "Option::is_none")]
    pub pcr0_values: Option<Vec<String>>,

    /// extra known good development PCR0 values (hex)
    #[serde(default, rename = "pcr0-dev-values", skip_serializing_if = "Option::is_none")]
    pub pcr0_dev_values: Option<Vec<String>>,

    #[serde(default = "default_remote_attestation", rename = "remote-attestation")]
    pub remote_attestation: bool,

    #[serde(default, rename = "prod-url", skip_serializing_if = "Option::is_none")]
    pub prod_url: Option<String>,

    #[serde(default, rename = "dev-url", skip_serializing_if = "Option::is_none")]
    pub dev_url: Option<String>,
}

impl Default for PcrConfig {
    fn default() -> Self {
        PcrConfig {
            pcr0_values: None,
            pcr0_dev_values: None,
            remote_attestation: default_remote_attestation(),
            prod_url: None,
            dev_url: None,
        }
    }
}

impl PcrConfig {
    /// Parse a JSON policy document, checking every listed value is a
    /// well-formed SHA-384 hex string
    pub fn load_json(j: &str) -> Result<Self, Error> {
        let c: PcrConfig = serde_json::from_str(j)?;

        let listed = c
            .pcr0_values
            .iter()
            .chain(c.pcr0_dev_values.iter())
            .flatten();

        for v in listed {
            if !is_pcr0_hex(v) {
                return Err(Error::Config(format!("{v} is not a 48 bytes hex value")));
            }
        }

        for u in c.prod_url.iter().chain(c.dev_url.iter()) {
            if !(u.starts_with("https://") || u.starts_with("http://")) {
                return Err(Error::Config(format!("{u} is not an HTTP(S) URL")));
            }
        }

        Ok(c)
    }
}

pub(crate) fn is_pcr0_hex(v: &str) -> bool {
    v.len() == 96 && v.bytes().all(|b| b.is_ascii_hexdigit())
}
