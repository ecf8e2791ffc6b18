// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! PCR0 policy: local known good lists backed by a signed remote release
//! history.
//!
//! # Example
//!
//! ```no_run
//! use nitrotoken::policy::{validate_pcr0_hash, PcrConfig};
//!
//! # async fn run() -> Result<(), nitrotoken::policy::Error> {
//! let config = PcrConfig::load_json(r#"{"remote-attestation": true}"#)?;
//!
//! let r = validate_pcr0_hash("c8275c3e3cd96b3cb256ae55ef8ce52b2dac4601bbd7698efbb76717b4a77c9473d9fc6b2ea93d7d4cff0fb800e675bf", &config).await?;
//!
//! if !r.is_match {
//!     println!("untrusted enclave image: {}", r.text);
//! }
//! # Ok(())
//! # }
//! ```

pub use self::config::PcrConfig;
pub use self::config::DEFAULT_DEV_HISTORY_URL;
pub use self::config::DEFAULT_PROD_HISTORY_URL;
pub use self::engine::validate_pcr0_hash;
pub use self::engine::Pcr0ValidationResult;
pub use self::engine::PcrValidator;
pub use self::errors::Error;
pub use self::history::default_history_key;
pub use self::history::history_key;
pub use self::history::parse_history;
pub use self::history::HistoryIndex;
pub use self::history::PcrHistoryEntry;
pub use self::history::DEFAULT_HISTORY_KEY;
pub use self::known::parse_list;
pub use self::known::KnownValues;

mod config;
mod engine;
mod errors;
mod history;
mod known;
