// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use log::debug;
use openssl::asn1::Asn1Time;
use openssl::ec::EcKey;
use openssl::pkey::Public;
use openssl::x509::{X509Ref, X509};
use std::cmp::Ordering;

/// A parsed certificate taking part in chain resolution
#[derive(Clone, Debug)]
pub struct ChainItem {
    pub cert: X509,
    pub der: Vec<u8>,
    pub is_root: bool,
}

impl ChainItem {
    fn from_der(der: &[u8], is_root: bool) -> Result<Self, Error> {
        let cert =
            X509::from_der(der).map_err(|e| Error::Chain(format!("unparsable certificate: {e}")))?;

        Ok(ChainItem {
            cert,
            der: der.to_vec(),
            is_root,
        })
    }

    pub fn subject(&self) -> String {
        subject_string(&self.cert)
    }

    pub fn not_before(&self) -> String {
        self.cert.not_before().to_string()
    }

    pub fn not_after(&self) -> String {
        self.cert.not_after().to_string()
    }

    fn is_valid_at(&self, now: &Asn1Time) -> Result<bool, Error> {
        let starts = self.cert.not_before().compare(now)?;
        let ends = self.cert.not_after().compare(now)?;

        Ok(starts != Ordering::Greater && ends != Ordering::Less)
    }
}

/// Renders a distinguished name as "C=US, O=Amazon, CN=..."
pub fn subject_string(cert: &X509Ref) -> String {
    cert.subject_name()
        .entries()
        .map(|e| {
            let k = e.object().nid().short_name().unwrap_or("?");
            let v = String::from_utf8_lossy(e.data().as_slice());
            format!("{k}={v}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A chain whose every link has been signature-checked and whose every
/// certificate was valid at the validation time.  Ordered root first.
#[derive(Clone, Debug)]
pub struct VerifiedChain {
    pub items: Vec<ChainItem>,
}

impl VerifiedChain {
    pub fn root(&self) -> Option<&ChainItem> {
        self.items.first()
    }

    pub fn leaf(&self) -> Option<&ChainItem> {
        self.items.last()
    }

    pub fn leaf_public_key(&self) -> Result<EcKey<Public>, Error> {
        let leaf = self
            .leaf()
            .ok_or_else(|| Error::Chain("empty chain".to_string()))?;

        let key = leaf.cert.public_key()?;

        key.ec_key()
            .map_err(|_| Error::Chain("leaf key is not an EC key".to_string()))
    }
}

fn signed_by(child: &X509Ref, issuer: &X509Ref) -> bool {
    issuer
        .public_key()
        .and_then(|k| child.verify(&k))
        .unwrap_or(false)
}

/// Resolve and check the chain from `leaf` up to `trusted_root`.
///
/// `cabundle` must start with a byte-exact copy of `trusted_root`; the
/// remaining entries may come in any order, each link is found by checking
/// which candidate's key verifies the current certificate.  `now` is in
/// seconds since the Unix epoch.
pub fn build_chain(
    trusted_root: &[u8],
    cabundle: &[Vec<u8>],
    leaf: &[u8],
    now: i64,
) -> Result<VerifiedChain, Error> {
    match cabundle.first() {
        Some(first) if first.as_slice() == trusted_root => {}
        Some(_) => {
            return Err(Error::Chain(
                "cabundle[0] does not match the trusted root".to_string(),
            ))
        }
        None => return Err(Error::Chain("empty cabundle".to_string())),
    }

    let pool = cabundle
        .iter()
        .map(|der| ChainItem::from_der(der, der.as_slice() == trusted_root))
        .collect::<Result<Vec<_>, _>>()?;

    let mut chain = vec![ChainItem::from_der(leaf, false)?];
    let mut used = vec![false; pool.len()];

    loop {
        let current = match chain.last() {
            Some(c) if !c.is_root => &c.cert,
            _ => break,
        };

        let next = (0..pool.len()).find(|i| !used[*i] && signed_by(current, &pool[*i].cert));

        match next {
            Some(i) => {
                used[i] = true;
                chain.push(pool[i].clone());
            }
            None => break,
        }
    }

    debug!("resolved {} of {} certificates", chain.len(), cabundle.len() + 1);

    if chain.len() != cabundle.len() + 1 || !chain.last().is_some_and(|c| c.is_root) {
        let dangling = chain
            .last()
            .map(|c| c.subject())
            .unwrap_or_default();
        return Err(Error::Chain(format!(
            "broken link after {dangling}: resolved {} certificates, expecting {}",
            chain.len(),
            cabundle.len() + 1
        )));
    }

    let t = Asn1Time::from_unix(now)?;

    for item in chain.iter() {
        if !item.is_valid_at(&t)? {
            return Err(Error::ExpiredCertificate(format!(
                "{} (valid {} to {})",
                item.subject(),
                item.not_before(),
                item.not_after()
            )));
        }
    }

    chain.reverse();

    Ok(VerifiedChain { items: chain })
}
