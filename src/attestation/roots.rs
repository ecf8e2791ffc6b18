// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use openssl::x509::X509;

/// AWS Nitro Enclaves Root-G1, as published by AWS
pub const AWS_NITRO_ROOT_G1_PEM: &str = include_str!("../../assets/aws_nitro_root_g1.pem");

/// SHA-256 of the DER encoding of [`AWS_NITRO_ROOT_G1_PEM`]
pub const AWS_NITRO_ROOT_G1_SHA256: &str =
    "641a0321a3e244efe456463195d606317ed7cdcc3c1756e09893f3c68f79bb5b";

/// DER bytes of the bundled AWS root, checked against its known fingerprint
pub fn aws_root_der() -> Result<Vec<u8>, Error> {
    let der = root_der_from_pem(AWS_NITRO_ROOT_G1_PEM.as_bytes())?;

    if fingerprint(&der) != AWS_NITRO_ROOT_G1_SHA256 {
        return Err(Error::Chain("bundled root fingerprint mismatch".to_string()));
    }

    Ok(der)
}

/// Convert a PEM trust anchor into the DER form the chain builder compares
/// against
pub fn root_der_from_pem(pem: &[u8]) -> Result<Vec<u8>, Error> {
    let cert =
        X509::from_pem(pem).map_err(|e| Error::Chain(format!("unparsable root: {e}")))?;

    Ok(cert.to_der()?)
}

/// Lowercase hex SHA-256 of a DER certificate
pub fn fingerprint(der: &[u8]) -> String {
    hex::encode(openssl::sha::sha256(der))
}
