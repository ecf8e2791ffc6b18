// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::config::PcrConfig;
use super::errors::Error;
use super::history::{default_history_key, HistoryIndex};
use super::known::KnownValues;
use crate::client::{Environment, HttpClient, IPcrHistorySource};
use chrono::TimeZone;
use log::{debug, warn};
use openssl::ec::EcKey;
use openssl::pkey::Public;
use serde::Serialize;

pub const TEXT_KNOWN_GOOD: &str = "PCR0 matches a known good value";
pub const TEXT_DEVELOPMENT: &str = "PCR0 matches development enclave";
pub const TEXT_REMOTE_PRODUCTION: &str = "PCR0 matches a signed production release";
pub const TEXT_REMOTE_DEVELOPMENT: &str = "PCR0 matches a signed development release";
pub const TEXT_NO_MATCH: &str = "PCR0 does not match a known good value";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pcr0ValidationResult {
    pub is_match: bool,
    pub text: String,
    pub verified_at: Option<String>,
}

impl Pcr0ValidationResult {
    fn matched(text: &str, verified_at: Option<String>) -> Self {
        Pcr0ValidationResult {
            is_match: true,
            text: text.to_string(),
            verified_at,
        }
    }

    fn no_match() -> Self {
        Pcr0ValidationResult {
            is_match: false,
            text: TEXT_NO_MATCH.to_string(),
            verified_at: None,
        }
    }
}

/// Decides whether a PCR0 measurement belongs to a trusted enclave build.
///
/// Local lists are consulted first, then (unless disabled) the signed
/// production and development histories.  Remote failures only ever mean
/// "no remote match".
pub struct PcrValidator<S> {
    source: S,
    config: PcrConfig,
    known: KnownValues,
    key: EcKey<Public>,
}

impl<S: IPcrHistorySource> PcrValidator<S> {
    pub fn new(source: S, config: PcrConfig) -> Result<Self, Error> {
        Ok(PcrValidator {
            source,
            known: KnownValues::from_config(&config),
            config,
            key: default_history_key()?,
        })
    }

    /// Replace the embedded history verification key
    pub fn with_verification_key(mut self, key: EcKey<Public>) -> Self {
        self.key = key;
        self
    }

    pub fn config(&self) -> &PcrConfig {
        &self.config
    }

    pub async fn validate_pcr0(&self, pcr0: &str) -> Pcr0ValidationResult {
        if self.known.is_production(pcr0) {
            return Pcr0ValidationResult::matched(TEXT_KNOWN_GOOD, None);
        }

        if self.known.is_development(pcr0) {
            return Pcr0ValidationResult::matched(TEXT_DEVELOPMENT, None);
        }

        if !self.config.remote_attestation {
            debug!("remote attestation disabled, {} unknown", pcr0);
            return Pcr0ValidationResult::no_match();
        }

        for env in [Environment::Production, Environment::Development] {
            if let Some(r) = self.remote_match(env, pcr0).await {
                return r;
            }
        }

        Pcr0ValidationResult::no_match()
    }

    async fn remote_match(&self, env: Environment, pcr0: &str) -> Option<Pcr0ValidationResult> {
        let url_override = match env {
            Environment::Production => self.config.prod_url.as_deref(),
            Environment::Development => self.config.dev_url.as_deref(),
        };

        let entries = match self.source.fetch_pcr_history(env, url_override).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("{} PCR history unavailable: {}", env, e);
                return None;
            }
        };

        let index = HistoryIndex::new(entries);
        let entry = index.find_verified(pcr0, &self.key)?;

        let text = match env {
            Environment::Production => TEXT_REMOTE_PRODUCTION,
            Environment::Development => TEXT_REMOTE_DEVELOPMENT,
        };

        Some(Pcr0ValidationResult::matched(
            text,
            Some(format_release_time(entry.timestamp)),
        ))
    }
}

fn format_release_time(secs: i64) -> String {
    chrono::Utc
        .timestamp_opt(secs, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Validate `pcr0` (lowercase hex) against `config`, fetching remote
/// history over HTTPS when enabled
pub async fn validate_pcr0_hash(
    pcr0: &str,
    config: &PcrConfig,
) -> Result<Pcr0ValidationResult, Error> {
    // history URLs are absolute, no backend needed
    let source = HttpClient::new("", None).map_err(|e| Error::Network(e.to_string()))?;

    let v = PcrValidator::new(source, config.clone())?;

    Ok(v.validate_pcr0(pcr0).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::history::testutil::*;
    use crate::policy::PcrHistoryEntry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const PCR0: &str = "c8275c3e3cd96b3cb256ae55ef8ce52b2dac4601bbd7698efbb76717b4a77c9473d9fc6b2ea93d7d4cff0fb800e675bf";

    #[derive(Default)]
    struct MockSource {
        prod: Option<Vec<PcrHistoryEntry>>,
        dev: Option<Vec<PcrHistoryEntry>>,
        calls: AtomicUsize,
        urls: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl IPcrHistorySource for MockSource {
        async fn fetch_pcr_history(
            &self,
            env: Environment,
            url_override: Option<&str>,
        ) -> Result<Vec<PcrHistoryEntry>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls
                .lock()
                .unwrap()
                .push(url_override.map(str::to_string));

            let h = match env {
                Environment::Production => &self.prod,
                Environment::Development => &self.dev,
            };

            h.clone()
                .ok_or_else(|| Error::Network("connection refused".to_string()))
        }
    }

    fn validator(source: MockSource, config: PcrConfig) -> (PcrValidator<MockSource>, EcKey<openssl::pkey::Private>) {
        let (private, public) = signing_key();
        let v = PcrValidator::new(source, config)
            .unwrap()
            .with_verification_key(public);
        (v, private)
    }

    #[tokio::test]
    async fn local_production_match_skips_network() {
        let config = PcrConfig {
            pcr0_values: Some(vec![PCR0.to_string()]),
            ..Default::default()
        };
        let (v, _) = validator(MockSource::default(), config);

        let r = v.validate_pcr0(PCR0).await;

        assert_eq!(r, Pcr0ValidationResult::matched(TEXT_KNOWN_GOOD, None));
        assert_eq!(v.source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn local_development_match() {
        let config = PcrConfig {
            pcr0_dev_values: Some(vec![PCR0.to_string()]),
            ..Default::default()
        };
        let (v, _) = validator(MockSource::default(), config);

        let r = v.validate_pcr0(PCR0).await;

        assert!(r.is_match);
        assert_eq!(r.text, TEXT_DEVELOPMENT);
        assert_eq!(v.source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn network_errors_mean_no_match() {
        let (v, _) = validator(MockSource::default(), PcrConfig::default());

        let r = v.validate_pcr0(PCR0).await;

        assert_eq!(r, Pcr0ValidationResult::no_match());
        assert_eq!(v.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn remote_disabled() {
        let config = PcrConfig {
            remote_attestation: false,
            ..Default::default()
        };
        let (v, _) = validator(MockSource::default(), config);

        assert!(!v.validate_pcr0(PCR0).await.is_match);
        assert_eq!(v.source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remote_production_match() {
        let (private, public) = signing_key();
        let source = MockSource {
            prod: Some(vec![signed_entry(&private, PCR0, 1_721_159_587)]),
            ..Default::default()
        };
        let v = PcrValidator::new(source, PcrConfig::default())
            .unwrap()
            .with_verification_key(public);

        let r = v.validate_pcr0(PCR0).await;

        assert!(r.is_match);
        assert_eq!(r.text, TEXT_REMOTE_PRODUCTION);
        assert_eq!(r.verified_at.as_deref(), Some("2024-07-16 19:53:07 UTC"));
        assert_eq!(v.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn development_history_after_failed_production() {
        let (private, public) = signing_key();
        let source = MockSource {
            prod: None,
            dev: Some(vec![signed_entry(&private, PCR0, 0)]),
            ..Default::default()
        };
        let v = PcrValidator::new(source, PcrConfig::default())
            .unwrap()
            .with_verification_key(public);

        let r = v.validate_pcr0(PCR0).await;

        assert!(r.is_match);
        assert_eq!(r.text, TEXT_REMOTE_DEVELOPMENT);
        assert_eq!(r.verified_at.as_deref(), Some("1970-01-01 00:00:00 UTC"));
    }

    #[tokio::test]
    async fn forged_history_entry() {
        let (rogue, _) = signing_key();
        let source = MockSource {
            prod: Some(vec![signed_entry(&rogue, PCR0, 1)]),
            dev: Some(vec![]),
            ..Default::default()
        };
        let (v, _) = validator(source, PcrConfig::default());

        assert_eq!(v.validate_pcr0(PCR0).await, Pcr0ValidationResult::no_match());
    }

    #[tokio::test]
    async fn idempotent() {
        let (private, public) = signing_key();
        let source = MockSource {
            prod: Some(vec![signed_entry(&private, PCR0, 5)]),
            ..Default::default()
        };
        let v = PcrValidator::new(source, PcrConfig::default())
            .unwrap()
            .with_verification_key(public);

        let a = v.validate_pcr0(PCR0).await;
        let b = v.validate_pcr0(PCR0).await;
        assert_eq!(a, b);

        let c = v.validate_pcr0(&"00".repeat(48)).await;
        let d = v.validate_pcr0(&"00".repeat(48)).await;
        assert_eq!(c, d);
        assert!(!c.is_match);
    }

    #[tokio::test]
    async fn url_overrides() {
        let config = PcrConfig {
            prod_url: Some("https://example.com/prod.json".to_string()),
            ..Default::default()
        };
        let (v, _) = validator(MockSource::default(), config);

        v.validate_pcr0(PCR0).await;

        assert_eq!(
            *v.source.urls.lock().unwrap(),
            vec![Some("https://example.com/prod.json".to_string()), None]
        );
    }
}
