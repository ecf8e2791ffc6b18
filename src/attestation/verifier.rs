// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::chain::{build_chain, VerifiedChain};
use super::codec::CoseEnvelope;
use super::document::AttestationDocument;
use super::errors::Error;
use super::roots::aws_root_der;
use super::signature;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Progress of a single `authenticate` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Decoded,
    SchemaValidated,
    NonceChecked,
    ChainBuilt,
    SignatureVerified,
    PcrsChecked,
    Done,
}

/// Authenticates attestation documents against one trusted root.
///
/// A `Verifier` holds no mutable state: the same instance can serve any
/// number of concurrent calls.
#[derive(Debug, Clone)]
pub struct Verifier {
    root: Vec<u8>,
    validation_time: Option<i64>,
    expected_pcrs: BTreeMap<u64, Vec<u8>>,
}

impl Verifier {
    /// `trusted_root` is the DER encoding of the root certificate
    pub fn new(trusted_root: Vec<u8>) -> Self {
        Verifier {
            root: trusted_root,
            validation_time: None,
            expected_pcrs: BTreeMap::new(),
        }
    }

    /// A verifier anchored to the bundled AWS Nitro Enclaves root
    pub fn aws() -> Result<Self, Error> {
        Ok(Self::new(aws_root_der()?))
    }

    /// Check certificate validity at `secs` (Unix time) instead of the
    /// current time
    pub fn with_validation_time(mut self, secs: i64) -> Self {
        self.validation_time = Some(secs);
        self
    }

    /// Require the given PCR values on top of a valid signature
    pub fn with_expected_pcrs(mut self, pcrs: BTreeMap<u64, Vec<u8>>) -> Self {
        self.expected_pcrs = pcrs;
        self
    }

    pub fn trusted_root(&self) -> &[u8] {
        &self.root
    }

    fn now(&self) -> i64 {
        self.validation_time
            .unwrap_or_else(|| chrono::Utc::now().timestamp())
    }

    /// Decode, check the nonce, resolve the chain and verify the signature
    /// of a base64 COSE_Sign1 attestation document.  Any failure is
    /// terminal.
    pub fn authenticate(&self, document: &str, nonce: &str) -> Result<AttestationDocument, Error> {
        let mut stage = Stage::Start;

        self.run(document, nonce, &mut stage).map_err(|e| {
            warn!("attestation rejected after {:?}: {}", stage, e);
            e
        })
    }

    fn run(
        &self,
        document: &str,
        nonce: &str,
        stage: &mut Stage,
    ) -> Result<AttestationDocument, Error> {
        let envelope = CoseEnvelope::from_base64(document)?;
        advance(stage, Stage::Decoded);

        let doc = AttestationDocument::decode(&envelope.payload)?;
        advance(stage, Stage::SchemaValidated);

        check_nonce(&doc, nonce)?;
        advance(stage, Stage::NonceChecked);

        let chain = self.chain(&doc)?;
        advance(stage, Stage::ChainBuilt);

        check_signature(&envelope, &chain)?;
        advance(stage, Stage::SignatureVerified);

        check_pcrs(&doc, &self.expected_pcrs)?;
        advance(stage, Stage::PcrsChecked);

        advance(stage, Stage::Done);

        Ok(doc)
    }

    pub(crate) fn chain(&self, doc: &AttestationDocument) -> Result<VerifiedChain, Error> {
        build_chain(&self.root, &doc.cabundle, &doc.certificate, self.now())
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!("attestation: {:?} -> {:?}", stage, next);
    *stage = next;
}

fn check_nonce(doc: &AttestationDocument, expected: &str) -> Result<(), Error> {
    let nonce = doc
        .nonce
        .as_deref()
        .ok_or_else(|| Error::NonceMismatch("document carries no nonce".to_string()))?;

    let nonce = std::str::from_utf8(nonce)
        .map_err(|_| Error::NonceMismatch("nonce is not UTF-8".to_string()))?;

    if nonce != expected {
        return Err(Error::NonceMismatch(format!(
            "expecting {expected}, got {nonce}"
        )));
    }

    Ok(())
}

fn check_pcrs(doc: &AttestationDocument, expected: &BTreeMap<u64, Vec<u8>>) -> Result<(), Error> {
    for (index, value) in expected.iter() {
        match doc.pcrs.get(index) {
            Some(actual) if actual == value => continue,
            Some(actual) => {
                return Err(Error::PcrMismatch(format!(
                    "PCR{index}: expecting {}, got {}",
                    hex::encode(value),
                    hex::encode(actual)
                )))
            }
            None => return Err(Error::PcrMismatch(format!("PCR{index} missing"))),
        }
    }

    Ok(())
}

pub(crate) fn check_signature(envelope: &CoseEnvelope, chain: &VerifiedChain) -> Result<(), Error> {
    let key = chain.leaf_public_key()?;

    let ok = signature::verify(
        &envelope.protected,
        &envelope.payload,
        &envelope.signature,
        &key,
    )?;

    if !ok {
        return Err(Error::SignatureInvalid(
            "COSE_Sign1 signature does not verify with the leaf key".to_string(),
        ));
    }

    Ok(())
}

/// One-shot `authenticate` against `trusted_root` (DER) at the current time
pub fn authenticate(
    document: &str,
    trusted_root: &[u8],
    nonce: &str,
) -> Result<AttestationDocument, Error> {
    Verifier::new(trusted_root.to_vec()).authenticate(document, nonce)
}
