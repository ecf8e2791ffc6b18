// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use crate::attestation::verify_p384_sha384;
use base64::{engine::general_purpose, Engine as _};
use log::debug;
use multimap::MultiMap;
use openssl::ec::{EcKey, EcKeyRef};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Public};
use serde::{Deserialize, Serialize};

/// Base64 SubjectPublicKeyInfo of the P-384 key that signs PCR history
/// entries
pub const DEFAULT_HISTORY_KEY: &str = "MHYwEAYHKoZIzj0CAQYFK4EEACIDYgAEnwe66HpTyCpg+xWCDvFrHck1scHUjw2IMjasrIwZs4IA4RL31hID8h6KAn+eLMJDdGmpOJxeNPTR8W2RicSdIUFCsLKLEx2D8jj+hQqJLvmGlGxlfMosyHiPipzX2ztr";

/// One released enclave build, as published in the remote history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcrHistoryEntry {
    #[serde(rename = "PCR0")]
    pub pcr0: String,
    #[serde(rename = "PCR1")]
    pub pcr1: String,
    #[serde(rename = "PCR2")]
    pub pcr2: String,
    /// seconds since the Unix epoch
    pub timestamp: i64,
    /// base64 raw r||s ECDSA P-384/SHA-384 signature over the PCR0 string
    pub signature: String,
}

impl PcrHistoryEntry {
    /// Whether the signature over PCR0 verifies under `key`.  Malformed
    /// signatures count as not verifying.
    pub fn verify(&self, key: &EcKeyRef<Public>) -> bool {
        let sig = match general_purpose::STANDARD.decode(self.signature.trim()) {
            Ok(sig) => sig,
            Err(e) => {
                debug!("history entry {}: bad signature encoding: {}", self.pcr0, e);
                return false;
            }
        };

        match verify_p384_sha384(self.pcr0.as_bytes(), &sig, key) {
            Ok(ok) => ok,
            Err(e) => {
                debug!("history entry {}: {}", self.pcr0, e);
                false
            }
        }
    }
}

pub fn parse_history(j: &str) -> Result<Vec<PcrHistoryEntry>, Error> {
    Ok(serde_json::from_str(j)?)
}

/// Load a P-384 public key from its base64 SubjectPublicKeyInfo encoding
pub fn history_key(spki: &str) -> Result<EcKey<Public>, Error> {
    let der = general_purpose::STANDARD
        .decode(spki.trim())
        .map_err(|e| Error::Config(format!("history key: {e}")))?;

    let key = PKey::public_key_from_der(&der)
        .and_then(|k| k.ec_key())
        .map_err(|e| Error::Config(format!("history key: {e}")))?;

    if key.group().curve_name() != Some(Nid::SECP384R1) {
        return Err(Error::Config("history key is not on P-384".to_string()));
    }

    Ok(key)
}

pub fn default_history_key() -> Result<EcKey<Public>, Error> {
    history_key(DEFAULT_HISTORY_KEY)
}

/// History entries grouped by PCR0, in publication order
#[derive(Debug, Default)]
pub struct HistoryIndex {
    entries: MultiMap<String, PcrHistoryEntry>,
}

impl HistoryIndex {
    pub fn new(entries: Vec<PcrHistoryEntry>) -> Self {
        let mut m = MultiMap::new();

        for e in entries.into_iter() {
            m.insert(e.pcr0.clone(), e);
        }

        Self { entries: m }
    }

    /// The first entry for `pcr0` whose signature verifies
    pub fn find_verified(&self, pcr0: &str, key: &EcKeyRef<Public>) -> Option<&PcrHistoryEntry> {
        self.entries
            .get_vec(pcr0)?
            .iter()
            .find(|e| e.verify(key))
    }
}
