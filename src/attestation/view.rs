// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::chain::subject_string;
use super::common::is_unmeasured;
use super::document::AttestationDocument;
use super::errors::Error;
use super::roots::fingerprint;
use chrono::TimeZone;
use openssl::x509::X509;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PcrView {
    pub id: u64,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateView {
    pub subject: String,
    pub not_before: String,
    pub not_after: String,
    pub pem: String,
    pub is_root: bool,
}

/// Display form of an already authenticated attestation document
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAttestationView {
    pub module_id: String,
    pub digest: String,
    pub timestamp: String,
    pub pcrs: Vec<PcrView>,
    pub certificates: Vec<CertificateView>,
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    pub public_key: Option<Vec<u8>>,
    pub user_data: Option<String>,
    pub nonce: Option<String>,
    pub cert0_hash: String,
}

/// Project `document` for display.  Certificates are listed in `cabundle`
/// order followed by the leaf.  Nothing is re-verified here.
pub fn parse_attestation_for_view(
    document: &AttestationDocument,
    cabundle: &[Vec<u8>],
) -> Result<ParsedAttestationView, Error> {
    let pcrs = document
        .pcrs
        .iter()
        .filter(|(_, v)| !is_unmeasured(v))
        .map(|(id, v)| PcrView {
            id: *id,
            value: hex::encode(v),
        })
        .collect();

    let mut certificates = Vec::with_capacity(cabundle.len() + 1);
    for (i, der) in cabundle.iter().enumerate() {
        certificates.push(certificate_view(der, i == 0)?);
    }
    certificates.push(certificate_view(&document.certificate, false)?);

    Ok(ParsedAttestationView {
        module_id: document.module_id.clone(),
        digest: document.digest.to_string(),
        timestamp: format_timestamp(document.timestamp),
        pcrs,
        certificates,
        public_key: document.public_key.clone(),
        user_data: document.user_data.as_deref().map(text_or_hex),
        nonce: document.nonce.as_deref().map(text_or_hex),
        cert0_hash: cabundle.first().map(|c| fingerprint(c)).unwrap_or_default(),
    })
}

fn certificate_view(der: &[u8], is_root: bool) -> Result<CertificateView, Error> {
    let cert = X509::from_der(der)?;

    let pem = String::from_utf8(cert.to_pem()?)
        .map_err(|e| Error::Crypto(format!("PEM is not UTF-8: {e}")))?;

    Ok(CertificateView {
        subject: subject_string(&cert),
        not_before: cert.not_before().to_string(),
        not_after: cert.not_after().to_string(),
        pem,
        is_root,
    })
}

fn text_or_hex(v: &[u8]) -> String {
    match std::str::from_utf8(v) {
        Ok(s) => s.to_string(),
        Err(_) => hex::encode(v),
    }
}

fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(|ms| chrono::Utc.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}
