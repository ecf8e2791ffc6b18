// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use ciborium::Value;

/// Size of a SHA-384 measurement
pub const PCR_LEN: usize = 48;

pub const MAX_PCRS: usize = 32;
pub const MAX_CABUNDLE_LEN: usize = 10;
pub const MAX_CERT_LEN: usize = 1024;
pub const MAX_PUBLIC_KEY_LEN: usize = 1024;
pub const MAX_USER_DATA_LEN: usize = 512;
pub const MAX_NONCE_LEN: usize = 512;

pub fn is_valid_pcr_index(value: u64) -> bool {
    value < MAX_PCRS as u64
}

pub fn is_valid_measurement(value: &[u8]) -> bool {
    value.len() == PCR_LEN
}

/// An all-zero PCR was never extended, it carries no measurement
pub fn is_unmeasured(value: &[u8]) -> bool {
    value.iter().all(|b| *b == 0)
}

pub(crate) fn to_bstr(v: &Value, field: &str) -> Result<Vec<u8>, Error> {
    match v {
        Value::Bytes(b) => Ok(b.clone()),
        other => Err(Error::schema(
            field,
            format!("expecting byte string, got {}", type_name(other)),
        )),
    }
}

pub(crate) fn to_nullable_bstr(v: &Value, field: &str) -> Result<Option<Vec<u8>>, Error> {
    if v.is_null() {
        return Ok(None);
    }

    to_bstr(v, field).map(Some)
}

pub(crate) fn to_tstr(v: &Value, field: &str) -> Result<String, Error> {
    match v {
        Value::Text(s) => Ok(s.clone()),
        other => Err(Error::schema(
            field,
            format!("expecting text string, got {}", type_name(other)),
        )),
    }
}

pub(crate) fn to_uint(v: &Value, field: &str) -> Result<u64, Error> {
    match v {
        Value::Integer(i) => {
            u64::try_from(*i).map_err(|_| Error::schema(field, "expecting unsigned integer"))
        }
        other => Err(Error::schema(
            field,
            format!("expecting integer, got {}", type_name(other)),
        )),
    }
}

pub(crate) fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Integer(_) => "integer",
        Value::Bytes(_) => "byte string",
        Value::Float(_) => "float",
        Value::Text(_) => "text string",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Tag(_, _) => "tag",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        _ => "unknown",
    }
}
