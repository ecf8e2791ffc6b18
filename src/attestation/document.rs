// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::codec::decode_cbor;
use super::common::*;
use super::errors::Error;
use bitmask::*;
use ciborium::Value;
use std::collections::BTreeMap;

/// 2020-01-01T00:00:00Z, earlier than any Nitro Enclave could have run
pub const MIN_TIMESTAMP_MS: u64 = 1_577_836_800_000;

const MODULE_ID_LABEL: &str = "module_id";
const DIGEST_LABEL: &str = "digest";
const TIMESTAMP_LABEL: &str = "timestamp";
const PCRS_LABEL: &str = "pcrs";
const CERTIFICATE_LABEL: &str = "certificate";
const CABUNDLE_LABEL: &str = "cabundle";
const PUBLIC_KEY_LABEL: &str = "public_key";
const USER_DATA_LABEL: &str = "user_data";
const NONCE_LABEL: &str = "nonce";

bitmask! {
    #[derive(Debug)]
    mask FieldSet: u16 where flags Fields {
        ModuleId    = 0x01,
        Digest      = 0x02,
        Timestamp   = 0x04,
        Pcrs        = 0x08,
        Certificate = 0x10,
        Cabundle    = 0x20,
        PublicKey   = 0x40,
        UserData    = 0x80,
        Nonce       = 0x100,
    }
}

/// The digest algorithm used by the NSM to extend PCRs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Digest {
    #[default]
    Sha384,
}

impl Digest {
    pub fn as_str(&self) -> &'static str {
        match self {
            Digest::Sha384 => "SHA384",
        }
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// For syntax and semantics of the attestation document, see §2.2 of the
/// AWS Nitro Enclaves "Attestation process" document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationDocument {
    pub module_id: String,                 // text, non-empty
    pub digest: Digest,                    // "SHA384"
    pub timestamp: u64,                    // ms since the Unix epoch
    pub pcrs: BTreeMap<u64, Vec<u8>>,      // { 0..31 => bytes .size 48 }
    pub certificate: Vec<u8>,              // bytes .size (1..1024), DER
    pub cabundle: Vec<Vec<u8>>,            // [ 1*10 bytes .size (1..1024) ], root first
    pub public_key: Option<Vec<u8>>,       // bytes .size (1..1024) / null
    pub user_data: Option<Vec<u8>>,        // bytes .size (0..512) / null
    pub nonce: Option<Vec<u8>>,            // bytes .size (0..512) / null

    fields: FieldSet,
}

impl Default for AttestationDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl AttestationDocument {
    pub fn new() -> Self {
        Self {
            module_id: String::new(),
            digest: Digest::Sha384,
            timestamp: 0,
            pcrs: BTreeMap::new(),
            certificate: Default::default(),
            cabundle: Default::default(),
            public_key: None,
            user_data: None,
            nonce: None,
            fields: FieldSet::none(),
        }
    }

    /// Decode and validate a CBOR encoded attestation document payload
    pub fn decode(buf: &[u8]) -> Result<AttestationDocument, Error> {
        let v = decode_cbor(buf)?;

        let mut doc = AttestationDocument::new();

        if let Value::Map(contents) = v {
            doc.parse(&contents)?;
        } else {
            return Err(Error::schema("document", "expecting map type"));
        }

        doc.validate()?;

        Ok(doc)
    }

    fn parse(&mut self, contents: &[(Value, Value)]) -> Result<(), Error> {
        for (k, v) in contents.iter() {
            if let Value::Text(label) = k {
                match label.as_str() {
                    MODULE_ID_LABEL => self.set_module_id(v)?,
                    DIGEST_LABEL => self.set_digest(v)?,
                    TIMESTAMP_LABEL => self.set_timestamp(v)?,
                    PCRS_LABEL => self.set_pcrs(v)?,
                    CERTIFICATE_LABEL => self.set_certificate(v)?,
                    CABUNDLE_LABEL => self.set_cabundle(v)?,
                    PUBLIC_KEY_LABEL => self.set_public_key(v)?,
                    USER_DATA_LABEL => self.set_user_data(v)?,
                    NONCE_LABEL => self.set_nonce(v)?,
                    _ => continue,
                }
            } else {
                // NSM only emits text keys
                continue;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        // public_key, user_data and nonce may be absent or null
        let mandatory_fields = [
            (Fields::ModuleId, MODULE_ID_LABEL),
            (Fields::Digest, DIGEST_LABEL),
            (Fields::Timestamp, TIMESTAMP_LABEL),
            (Fields::Pcrs, PCRS_LABEL),
            (Fields::Certificate, CERTIFICATE_LABEL),
            (Fields::Cabundle, CABUNDLE_LABEL),
        ];

        for (f, n) in mandatory_fields.iter() {
            if !self.fields.contains(*f) {
                return Err(Error::schema(n, "missing field"));
            }
        }

        Ok(())
    }

    fn check_dup(&self, f: Fields, label: &str) -> Result<(), Error> {
        if self.fields.contains(f) {
            return Err(Error::schema(label, "duplicated field"));
        }
        Ok(())
    }

    fn set_module_id(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Fields::ModuleId, MODULE_ID_LABEL)?;

        let x = to_tstr(v, MODULE_ID_LABEL)?;

        if x.is_empty() {
            return Err(Error::schema(MODULE_ID_LABEL, "empty module id"));
        }

        self.module_id = x;

        self.fields.set(Fields::ModuleId);

        Ok(())
    }

    fn set_digest(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Fields::Digest, DIGEST_LABEL)?;

        let x = to_tstr(v, DIGEST_LABEL)?;

        if x != Digest::Sha384.as_str() {
            return Err(Error::schema(
                DIGEST_LABEL,
                format!("unsupported digest {x}"),
            ));
        }

        self.digest = Digest::Sha384;

        self.fields.set(Fields::Digest);

        Ok(())
    }

    fn set_timestamp(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Fields::Timestamp, TIMESTAMP_LABEL)?;

        let x = to_uint(v, TIMESTAMP_LABEL)?;

        if x < MIN_TIMESTAMP_MS {
            return Err(Error::schema(
                TIMESTAMP_LABEL,
                format!("{x} is earlier than {MIN_TIMESTAMP_MS}"),
            ));
        }

        self.timestamp = x;

        self.fields.set(Fields::Timestamp);

        Ok(())
    }

    fn set_pcrs(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Fields::Pcrs, PCRS_LABEL)?;

        let contents = match v {
            Value::Map(m) => m,
            other => {
                return Err(Error::schema(
                    PCRS_LABEL,
                    format!("expecting map, got {}", type_name(other)),
                ))
            }
        };

        if contents.is_empty() || contents.len() > MAX_PCRS {
            return Err(Error::schema(
                PCRS_LABEL,
                format!("expecting 1 to {MAX_PCRS} entries, got {}", contents.len()),
            ));
        }

        for (k, pcr) in contents.iter() {
            let index = to_uint(k, PCRS_LABEL)?;

            if !is_valid_pcr_index(index) {
                return Err(Error::schema(PCRS_LABEL, format!("invalid index {index}")));
            }

            let value = to_bstr(pcr, PCRS_LABEL)?;

            if !is_valid_measurement(&value) {
                return Err(Error::schema(
                    PCRS_LABEL,
                    format!(
                        "PCR{index}: expecting {PCR_LEN} bytes, got {}",
                        value.len()
                    ),
                ));
            }

            if self.pcrs.insert(index, value).is_some() {
                return Err(Error::schema(
                    PCRS_LABEL,
                    format!("duplicated index {index}"),
                ));
            }
        }

        self.fields.set(Fields::Pcrs);

        Ok(())
    }

    fn set_certificate(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Fields::Certificate, CERTIFICATE_LABEL)?;

        let x = to_bstr(v, CERTIFICATE_LABEL)?;

        if x.is_empty() || x.len() > MAX_CERT_LEN {
            return Err(Error::schema(
                CERTIFICATE_LABEL,
                format!("invalid length {}", x.len()),
            ));
        }

        self.certificate = x;

        self.fields.set(Fields::Certificate);

        Ok(())
    }

    fn set_cabundle(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Fields::Cabundle, CABUNDLE_LABEL)?;

        let x = match v.as_array() {
            Some(x) => x,
            None => {
                return Err(Error::schema(CABUNDLE_LABEL, "MUST be array"));
            }
        };

        if x.is_empty() || x.len() > MAX_CABUNDLE_LEN {
            return Err(Error::schema(
                CABUNDLE_LABEL,
                format!("expecting 1 to {MAX_CABUNDLE_LEN} entries, got {}", x.len()),
            ));
        }

        for (i, xi) in x.iter().enumerate() {
            let cert = to_bstr(xi, CABUNDLE_LABEL)?;

            if cert.is_empty() || cert.len() > MAX_CERT_LEN {
                return Err(Error::schema(
                    CABUNDLE_LABEL,
                    format!("entry {i}: invalid length {}", cert.len()),
                ));
            }

            self.cabundle.push(cert);
        }

        self.fields.set(Fields::Cabundle);

        Ok(())
    }

    fn set_public_key(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Fields::PublicKey, PUBLIC_KEY_LABEL)?;

        let x = to_nullable_bstr(v, PUBLIC_KEY_LABEL)?;

        if let Some(k) = &x {
            if k.is_empty() || k.len() > MAX_PUBLIC_KEY_LEN {
                return Err(Error::schema(
                    PUBLIC_KEY_LABEL,
                    format!("invalid length {}", k.len()),
                ));
            }
        }

        self.public_key = x;

        self.fields.set(Fields::PublicKey);

        Ok(())
    }

    fn set_user_data(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Fields::UserData, USER_DATA_LABEL)?;

        let x = to_nullable_bstr(v, USER_DATA_LABEL)?;

        if x.as_ref().is_some_and(|d| d.len() > MAX_USER_DATA_LEN) {
            return Err(Error::schema(USER_DATA_LABEL, "too long"));
        }

        self.user_data = x;

        self.fields.set(Fields::UserData);

        Ok(())
    }

    fn set_nonce(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Fields::Nonce, NONCE_LABEL)?;

        let x = to_nullable_bstr(v, NONCE_LABEL)?;

        if x.as_ref().is_some_and(|d| d.len() > MAX_NONCE_LEN) {
            return Err(Error::schema(NONCE_LABEL, "too long"));
        }

        self.nonce = x;

        self.fields.set(Fields::Nonce);

        Ok(())
    }

    /// The enclave image measurement
    pub fn pcr0(&self) -> Option<&Vec<u8>> {
        self.pcrs.get(&0)
    }
}

/// What a local development backend sends in place of a real attestation
/// document: same envelope, unsigned payload, and only the public key is
/// meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalDocument {
    pub public_key: Option<Vec<u8>>,
}

impl LocalDocument {
    pub fn decode(buf: &[u8]) -> Result<LocalDocument, Error> {
        let v = decode_cbor(buf)?;

        let contents = match v {
            Value::Map(m) => m,
            _ => return Err(Error::schema("document", "expecting map type")),
        };

        let mut doc = LocalDocument::default();

        for (k, v) in contents.iter() {
            if k.as_text() == Some(PUBLIC_KEY_LABEL) {
                doc.public_key = to_nullable_bstr(v, PUBLIC_KEY_LABEL)?;
            }
        }

        Ok(doc)
    }
}
