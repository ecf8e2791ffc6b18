// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! AWS Nitro Enclaves attestation document decoding and verification

pub use self::chain::build_chain;
pub use self::chain::ChainItem;
pub use self::chain::VerifiedChain;
pub use self::codec::decode_base64;
pub use self::codec::decode_cbor;
pub use self::codec::encode_cbor;
pub use self::codec::CoseEnvelope;
pub use self::common::*;
pub use self::document::AttestationDocument;
pub use self::document::Digest;
pub use self::document::LocalDocument;
pub use self::document::MIN_TIMESTAMP_MS;
pub use self::errors::Error;
pub use self::roots::aws_root_der;
pub use self::roots::fingerprint;
pub use self::roots::root_der_from_pem;
pub use self::roots::AWS_NITRO_ROOT_G1_PEM;
pub use self::roots::AWS_NITRO_ROOT_G1_SHA256;
pub use self::signature::sig_structure;
pub use self::signature::verify as verify_signature;
pub use self::signature::verify_p384_sha384;
pub use self::verifier::authenticate;
pub use self::verifier::Stage;
pub use self::verifier::Verifier;
pub use self::view::parse_attestation_for_view;
pub use self::view::CertificateView;
pub use self::view::ParsedAttestationView;
pub use self::view::PcrView;

mod chain;
mod codec;
mod common;
mod document;
mod errors;
mod roots;
mod signature;
mod verifier;
mod view;

#[cfg(test)]
pub(crate) mod testutil;
