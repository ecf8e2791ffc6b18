// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::config::PcrConfig;

const BUILTIN_PRODUCTION: &str = include_str!("../../assets/pcr0_production.txt");
const BUILTIN_DEVELOPMENT: &str = include_str!("../../assets/pcr0_development.txt");

/// Parse a one-value-per-line list, skipping blanks and `#` comments
pub fn parse_list(s: &str) -> Vec<String> {
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Local known good PCR0 values: the built-in lists extended with the
/// caller's extras
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownValues {
    pub production: Vec<String>,
    pub development: Vec<String>,
}

impl KnownValues {
    pub fn builtin() -> Self {
        KnownValues {
            production: parse_list(BUILTIN_PRODUCTION),
            development: parse_list(BUILTIN_DEVELOPMENT),
        }
    }

    pub fn from_config(config: &PcrConfig) -> Self {
        let mut k = Self::builtin();

        if let Some(extra) = &config.pcr0_values {
            k.production.extend(extra.iter().cloned());
        }

        if let Some(extra) = &config.pcr0_dev_values {
            k.development.extend(extra.iter().cloned());
        }

        k
    }

    pub fn is_production(&self, pcr0: &str) -> bool {
        self.production.iter().any(|v| v == pcr0)
    }

    pub fn is_development(&self, pcr0: &str) -> bool {
        self.development.iter().any(|v| v == pcr0)
    }
}
