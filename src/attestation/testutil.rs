// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Synthetic PKI and document builders shared by the unit tests.

use super::codec::{decode_base64, encode_cbor, CoseEnvelope};
use super::document::AttestationDocument;
use super::signature::sig_structure;
use base64::{engine::general_purpose, Engine as _};
use ciborium::Value;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use std::time::{SystemTime, UNIX_EPOCH};

/// Validation time of the captured AWS sample, in seconds
pub(crate) const SAMPLE_TIME: i64 = 1_721_159_587;

pub(crate) const SAMPLE_MODULE_ID: &str = "i-059e862454f4a8d8f-enc0190a2f1964172e6";

pub(crate) const SAMPLE_PCR0: &str = "c8275c3e3cd96b3cb256ae55ef8ce52b2dac4601bbd7698efbb76717b4a77c9473d9fc6b2ea93d7d4cff0fb800e675bf";

pub(crate) const SAMPLE_PCR2: &str = "21b9efbc184807662e966d34f390821309eeac6802309798826296bf3e8bec7c10edb30948c90ba67310f7b964fc500a";

pub(crate) fn sample_b64() -> &'static str {
    include_str!("../../testdata/nitro-sample-2024-07-16.b64")
}

pub(crate) fn sample() -> (CoseEnvelope, AttestationDocument) {
    let envelope = CoseEnvelope::decode(&decode_base64(sample_b64()).unwrap()).unwrap();
    let doc = AttestationDocument::decode(&envelope.payload).unwrap();
    (envelope, doc)
}

pub(crate) fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub(crate) fn p384_key() -> EcKey<Private> {
    let group = EcGroup::from_curve_name(Nid::SECP384R1).unwrap();
    EcKey::generate(&group).unwrap()
}

/// Issue a certificate for `key`, self-signed when `issuer` is None
pub(crate) fn make_cert(
    cn: &str,
    key: &EcKey<Private>,
    issuer: Option<(&X509, &EcKey<Private>)>,
    not_before: i64,
    not_after: i64,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("C", "US").unwrap();
    name.append_entry_by_text("O", "Test").unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let pkey = PKey::from_ec_key(key.clone()).unwrap();

    let mut b = X509Builder::new().unwrap();
    b.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial_for(cn)).unwrap();
    b.set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    b.set_subject_name(&name).unwrap();
    b.set_pubkey(&pkey).unwrap();
    b.set_not_before(&Asn1Time::from_unix(not_before).unwrap())
        .unwrap();
    b.set_not_after(&Asn1Time::from_unix(not_after).unwrap())
        .unwrap();

    match issuer {
        Some((issuer_cert, issuer_key)) => {
            b.append_extension(BasicConstraints::new().build().unwrap())
                .unwrap();
            b.set_issuer_name(issuer_cert.subject_name()).unwrap();
            let ikey = PKey::from_ec_key(issuer_key.clone()).unwrap();
            b.sign(&ikey, MessageDigest::sha384()).unwrap();
        }
        None => {
            b.append_extension(BasicConstraints::new().critical().ca().build().unwrap())
                .unwrap();
            b.set_issuer_name(&name).unwrap();
            b.sign(&pkey, MessageDigest::sha384()).unwrap();
        }
    }

    b.build()
}

fn serial_for(cn: &str) -> u32 {
    cn.bytes().fold(7u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
}

/// ES384 raw r||s signature over the COSE Signature1 structure
pub(crate) fn sign_es384(key: &EcKey<Private>, protected: &[u8], payload: &[u8]) -> Vec<u8> {
    let tbs = sig_structure(protected, payload).unwrap();
    let digest = openssl::sha::sha384(&tbs);
    let sig = EcdsaSig::sign(&digest, key).unwrap();

    let mut raw = sig.r().to_vec_padded(48).unwrap();
    raw.extend(sig.s().to_vec_padded(48).unwrap());
    raw
}

/// {1: -35}
pub(crate) const ES384_PROTECTED: [u8; 4] = [0xa1, 0x01, 0x38, 0x22];

/// root -> int1 -> int2 -> leaf.  CAs are valid for a day either side of
/// the current time, the leaf for an hour unless told otherwise.
pub(crate) struct Fixture {
    pub root: X509,
    pub int1: X509,
    pub int2: X509,
    pub leaf: X509,
    pub leaf_key: EcKey<Private>,
    root_key: EcKey<Private>,
}

impl Fixture {
    pub fn new() -> Self {
        let t = now();
        Self::with_leaf_validity(t - 3600, t + 3600)
    }

    pub fn with_leaf_validity(not_before: i64, not_after: i64) -> Self {
        let t = now();
        let (from, to) = (t - 86400, t + 86400);

        let root_key = p384_key();
        let root = make_cert("root", &root_key, None, from, to);

        let int1_key = p384_key();
        let int1 = make_cert("int1", &int1_key, Some((&root, &root_key)), from, to);

        let int2_key = p384_key();
        let int2 = make_cert("int2", &int2_key, Some((&int1, &int1_key)), from, to);

        let leaf_key = p384_key();
        let leaf = make_cert("leaf", &leaf_key, Some((&int2, &int2_key)), not_before, not_after);

        Fixture {
            root,
            int1,
            int2,
            leaf,
            leaf_key,
            root_key,
        }
    }

    pub fn root_der(&self) -> Vec<u8> {
        self.root.to_der().unwrap()
    }

    /// root first
    pub fn cabundle(&self) -> Vec<Vec<u8>> {
        vec![
            self.root.to_der().unwrap(),
            self.int1.to_der().unwrap(),
            self.int2.to_der().unwrap(),
        ]
    }

    /// A certificate with the same name as the leaf, issued by a stranger
    pub fn rogue_leaf(&self) -> X509 {
        let t = now();
        let stranger_key = p384_key();
        let stranger = make_cert("root", &stranger_key, None, t - 3600, t + 3600);
        make_cert("leaf", &p384_key(), Some((&stranger, &stranger_key)), t - 3600, t + 3600)
    }

    pub fn root_key(&self) -> &EcKey<Private> {
        &self.root_key
    }

    pub fn payload_fields(&self, nonce: Option<&[u8]>) -> Vec<(Value, Value)> {
        let field = |k: &str, v: Value| (Value::Text(k.to_string()), v);

        vec![
            field("module_id", Value::Text("i-0123456789abcdef0-enc0123".to_string())),
            field("digest", Value::Text("SHA384".to_string())),
            field("timestamp", Value::Integer(((now() as u64) * 1000).into())),
            field(
                "pcrs",
                Value::Map(vec![
                    (Value::Integer(0.into()), Value::Bytes(vec![0xaa; 48])),
                    (Value::Integer(1.into()), Value::Bytes(vec![0xbb; 48])),
                    (Value::Integer(2.into()), Value::Bytes(vec![0; 48])),
                ]),
            ),
            field("certificate", Value::Bytes(self.leaf.to_der().unwrap())),
            field(
                "cabundle",
                Value::Array(self.cabundle().into_iter().map(Value::Bytes).collect()),
            ),
            field("public_key", Value::Bytes(vec![0x04; 97])),
            field("user_data", Value::Bytes(b"hello".to_vec())),
            field(
                "nonce",
                match nonce {
                    Some(n) => Value::Bytes(n.to_vec()),
                    None => Value::Null,
                },
            ),
        ]
    }

    /// Sign `payload` with the leaf key and wrap it into a base64 COSE_Sign1
    pub fn seal(&self, payload: &[u8]) -> String {
        let signature = sign_es384(&self.leaf_key, &ES384_PROTECTED, payload);
        envelope_b64(&ES384_PROTECTED, payload, &signature)
    }

    pub fn document(&self, nonce: &str) -> String {
        let payload = encode_cbor(&Value::Map(self.payload_fields(Some(nonce.as_bytes())))).unwrap();
        self.seal(&payload)
    }
}

pub(crate) fn envelope_b64(protected: &[u8], payload: &[u8], signature: &[u8]) -> String {
    let v = Value::Array(vec![
        Value::Bytes(protected.to_vec()),
        Value::Map(vec![]),
        Value::Bytes(payload.to_vec()),
        Value::Bytes(signature.to_vec()),
    ]);
    general_purpose::STANDARD.encode(encode_cbor(&v).unwrap())
}
