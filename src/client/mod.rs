// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Collaborators that talk to the enclave backend and the PCR history
//! hosts, and the client-side attestation flow built on them.

pub use self::attestation_client::is_local_endpoint;
pub use self::attestation_client::Attestation;
pub use self::attestation_client::AttestationClient;
pub use self::attestation_client::Handshake;
pub use self::attestation_client::LOCAL_ENDPOINTS;
pub use self::http::default_history_url;
pub use self::http::HttpClient;
pub use self::sources::Environment;
pub use self::sources::IAttestationSource;
pub use self::sources::IPcrHistorySource;

mod attestation_client;
mod http;
mod sources;
