// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! AWS Nitro Enclaves attestation document verification.
//!
//! This crate provides an API to authenticate the attestation documents an
//! AWS Nitro Enclave hands out to its clients, and to decide whether the
//! enclave image it describes is a trusted one.  For detailed information
//! about the format, see the [Nitro Enclaves attestation process] document.
//!
//! The API allows:
//! * Decoding a base64 COSE_Sign1 attestation document and its CBOR payload
//! * Resolving the certificate chain up to a trusted root and verifying the
//!   ES384 signature
//! * Binding the document to a caller-chosen nonce
//! * Appraising PCR0 against known good values and a signed release history
//!
//! # Example
//!
//! ```no_run
//! use nitrotoken::attestation::Verifier;
//!
//! # fn run(document: &str) -> Result<(), nitrotoken::attestation::Error> {
//! let v = Verifier::aws()?;
//!
//! let doc = v.authenticate(document, "0b4f8d9e-5a7c-4f43-9a3e-2f1d6c8b7a90")?;
//!
//! println!("{} PCR0={}", doc.module_id, hex::encode(doc.pcr0().unwrap_or(&vec![])));
//! # Ok(())
//! # }
//! ```
//!
//! [Nitro Enclaves attestation process]: https://github.com/aws/aws-nitro-enclaves-nsm-api/blob/main/docs/attestation_process.md

pub mod attestation;
pub mod client;
pub mod policy;
