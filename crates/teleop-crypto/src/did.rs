// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `did:key` parsing and resolution with a TTL + max-size cache (§4.2).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};

/// Multicodec prefix for an ed25519 public key, per the `did:key` spec.
const MULTICODEC_ED25519_PUB: u8 = 0xed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    Ed25519,
}

/// A resolved `did:key` verification method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDocument {
    pub id: String,
    pub key_type: KeyType,
    pub public_key: Vec<u8>,
    pub authentication: String,
    pub assertion_method: String,
}

/// Parse and resolve a `did:key:<multibase>` identifier without consulting
/// the cache.
pub fn resolve_did_key(did: &str) -> CryptoResult<DidDocument> {
    let mut parts = did.split(':');
    let scheme = parts.next().ok_or_else(|| CryptoError::InvalidDid(did.to_string()))?;
    if scheme != "did" {
        return Err(CryptoError::InvalidDid(did.to_string()));
    }
    let method = parts.next().ok_or_else(|| CryptoError::InvalidDid(did.to_string()))?;
    if method != "key" {
        return Err(CryptoError::UnsupportedMethod(method.to_string()));
    }
    let identifier = parts.next().ok_or_else(|| CryptoError::InvalidDid(did.to_string()))?;
    if parts.next().is_some() {
        return Err(CryptoError::InvalidDid(did.to_string()));
    }

    // Multibase `z` prefix denotes base58btc.
    let payload = identifier
        .strip_prefix('z')
        .ok_or(CryptoError::InvalidMultibase)?;
    let decoded = bs58::decode(payload)
        .into_vec()
        .map_err(|_| CryptoError::InvalidMultibase)?;

    let (prefix, key_bytes) = decoded.split_first().ok_or(CryptoError::InvalidMultibase)?;
    if *prefix != MULTICODEC_ED25519_PUB {
        return Err(CryptoError::UnsupportedKeyType);
    }
    if key_bytes.len() != 32 {
        return Err(CryptoError::InvalidPublicKey);
    }

    let verification_method = format!("{did}#{identifier}");
    Ok(DidDocument {
        id: did.to_string(),
        key_type: KeyType::Ed25519,
        public_key: key_bytes.to_vec(),
        authentication: verification_method.clone(),
        assertion_method: verification_method,
    })
}

struct CacheEntry {
    document: DidDocument,
    inserted_at: Instant,
}

/// TTL + max-size cache in front of [`resolve_did_key`]. Only successful
/// resolutions are cached (§4.2).
pub struct DidCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    max_size: usize,
}

impl DidCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        DidCache {
            entries: HashMap::new(),
            ttl,
            max_size,
        }
    }

    pub fn with_defaults() -> Self {
        DidCache::new(Duration::from_secs(60), 1000)
    }

    /// Resolve `did`, consulting and populating the cache.
    pub fn resolve(&mut self, did: &str) -> CryptoResult<DidDocument> {
        if let Some(entry) = self.entries.get(did) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Ok(entry.document.clone());
            }
            self.entries.remove(did);
        }

        let document = resolve_did_key(did)?;
        self.insert(did.to_string(), document.clone());
        Ok(document)
    }

    fn insert(&mut self, did: String, document: DidDocument) {
        if self.entries.len() >= self.max_size && !self.entries.contains_key(&did) {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            did,
            CacheEntry {
                document,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
