// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::codec::{decode_cbor, encode_cbor};
use super::errors::Error;
use ciborium::Value;
use openssl::bn::BigNum;
use openssl::ec::EcKeyRef;
use openssl::ecdsa::EcdsaSig;
use openssl::pkey::HasPublic;

const SIGNATURE1_CONTEXT: &str = "Signature1";
const COSE_HEADER_ALG: i128 = 1;
const COSE_ALG_ES384: i128 = -35;

/// Size of a raw r||s P-384 signature
pub const ES384_SIG_LEN: usize = 96;

/// Canonical encoding of the COSE Sig_structure for a COSE_Sign1 with no
/// external AAD
pub fn sig_structure(protected: &[u8], payload: &[u8]) -> Result<Vec<u8>, Error> {
    let v = Value::Array(vec![
        Value::Text(SIGNATURE1_CONTEXT.to_string()),
        Value::Bytes(protected.to_vec()),
        Value::Bytes(vec![]),
        Value::Bytes(payload.to_vec()),
    ]);

    encode_cbor(&v)
}

fn check_protected_header(protected: &[u8]) -> Result<(), Error> {
    let v = decode_cbor(protected)?;

    let m = v
        .as_map()
        .ok_or_else(|| Error::SignatureInvalid("protected header is not a map".to_string()))?;

    let alg = m.iter().find_map(|(k, v)| match (k, v) {
        (Value::Integer(k), Value::Integer(v)) if i128::from(*k) == COSE_HEADER_ALG => {
            Some(i128::from(*v))
        }
        _ => None,
    });

    match alg {
        Some(COSE_ALG_ES384) => Ok(()),
        Some(a) => Err(Error::SignatureInvalid(format!(
            "unsupported algorithm {a}"
        ))),
        None => Err(Error::SignatureInvalid(
            "protected header has no algorithm".to_string(),
        )),
    }
}

/// ECDSA P-384 over SHA-384 of `msg`, with `sig` in raw r||s form.  A
/// well-formed signature that does not match yields `Ok(false)`.
pub fn verify_p384_sha384<T: HasPublic>(
    msg: &[u8],
    sig: &[u8],
    key: &EcKeyRef<T>,
) -> Result<bool, Error> {
    if sig.len() != ES384_SIG_LEN {
        return Err(Error::SignatureInvalid(format!(
            "expecting {ES384_SIG_LEN} bytes signature, got {}",
            sig.len()
        )));
    }

    let (r, s) = sig.split_at(ES384_SIG_LEN / 2);
    let sig = EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?;

    let digest = openssl::sha::sha384(msg);

    Ok(sig.verify(&digest, key)?)
}

/// Verify a COSE_Sign1 signature made with ES384
pub fn verify<T: HasPublic>(
    protected: &[u8],
    payload: &[u8],
    signature: &[u8],
    key: &EcKeyRef<T>,
) -> Result<bool, Error> {
    check_protected_header(protected)?;

    let tbs = sig_structure(protected, payload)?;

    verify_p384_sha384(&tbs, signature, key)
}
