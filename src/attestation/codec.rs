// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use base64::{engine::general_purpose, Engine as _};
use ciborium::de::from_reader;
use ciborium::ser::into_writer;
use ciborium::Value;

const COSE_SIGN1_TAG: u64 = 18;

/// decodes bytes from a standard base64-encoded string
pub fn decode_base64(v: &str) -> Result<Vec<u8>, Error> {
    general_purpose::STANDARD
        .decode(v.trim())
        .map_err(|e| Error::Decode(format!("base64: {e}")))
}

/// decodes exactly one CBOR data item, rejecting anything after it
pub fn decode_cbor(buf: &[u8]) -> Result<Value, Error> {
    let mut rest = buf;

    let v = from_reader(&mut rest).map_err(|e| Error::Decode(format!("cbor: {e}")))?;

    if !rest.is_empty() {
        return Err(Error::Decode(format!(
            "cbor: {} trailing bytes after data item",
            rest.len()
        )));
    }

    Ok(v)
}

/// encodes a CBOR data item using definite lengths and the shortest
/// argument encoding for every head
pub fn encode_cbor(v: &Value) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    into_writer(v, &mut buf).map_err(|e| Error::Decode(format!("cbor: {e}")))?;
    Ok(buf)
}

/// The three signed parts of a COSE_Sign1 attestation document.  The
/// unprotected header is dropped on decode: NSM never puts anything there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseEnvelope {
    pub protected: Vec<u8>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CoseEnvelope {
    /// Decode a base64 COSE_Sign1 document
    pub fn from_base64(v: &str) -> Result<CoseEnvelope, Error> {
        let buf = decode_base64(v)?;
        Self::decode(&buf)
    }

    /// Decode a CBOR-encoded COSE_Sign1 array, tagged or untagged
    pub fn decode(buf: &[u8]) -> Result<CoseEnvelope, Error> {
        let mut v = decode_cbor(buf)?;

        if let Value::Tag(t, inner) = v {
            if t != COSE_SIGN1_TAG {
                return Err(Error::Decode(format!(
                    "expecting tag {COSE_SIGN1_TAG}, got {t}"
                )));
            }
            v = *inner;
        }

        let parts = match v {
            Value::Array(parts) => parts,
            _ => return Err(Error::Decode("expecting array type".to_string())),
        };

        if parts.len() != 4 {
            return Err(Error::Decode(format!(
                "COSE_Sign1 must have 4 elements, got {}",
                parts.len()
            )));
        }

        let mut it = parts.into_iter();
        let protected = into_bstr(it.next(), "protected header")?;
        let _unprotected = it.next();
        let payload = into_bstr(it.next(), "payload")?;
        let signature = into_bstr(it.next(), "signature")?;

        Ok(CoseEnvelope {
            protected,
            payload,
            signature,
        })
    }
}

fn into_bstr(v: Option<Value>, what: &str) -> Result<Vec<u8>, Error> {
    match v {
        Some(Value::Bytes(b)) => Ok(b),
        _ => Err(Error::Decode(format!("{what} MUST be a byte string"))),
    }
}
