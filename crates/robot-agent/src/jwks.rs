// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JWKS fetcher (§4.9): polls the Gateway's verification-key set on a
//! configured interval and on key-not-found, with bounded retries.

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::VerifyingKey;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use teleop_crypto::token::{jwk_to_verifying_key, JwksDocument};

use crate::error::AgentError;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_FETCH_RETRIES: u32 = 3;

/// Caches the Gateway's published verification keys and refreshes them in
/// the background. `verifying_key` triggers an out-of-band refresh on a
/// cache miss before giving up (§4.9).
pub struct JwksFetcher {
    client: reqwest::Client,
    url: String,
    cache: RwLock<JwksDocument>,
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        JwksFetcher {
            client,
            url: url.into(),
            cache: RwLock::new(JwksDocument::default()),
        }
    }

    /// Fetch and replace the cached document, retrying with a short linear
    /// backoff up to [`MAX_FETCH_RETRIES`] times.
    pub async fn refresh(&self) -> Result<(), AgentError> {
        let mut last_err = String::new();
        for attempt in 0..MAX_FETCH_RETRIES {
            match self.fetch_once().await {
                Ok(doc) => {
                    *self.cache.write() = doc;
                    return Ok(());
                }
                Err(e) => {
                    last_err = e;
                    if attempt + 1 < MAX_FETCH_RETRIES {
                        tokio::time::sleep(Duration::from_millis(200 * (attempt as u64 + 1))).await;
                    }
                }
            }
        }
        Err(AgentError::JwksFetchFailed(last_err))
    }

    async fn fetch_once(&self) -> Result<JwksDocument, String> {
        let resp = self.client.get(&self.url).send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("status {}", resp.status()));
        }
        resp.json::<JwksDocument>().await.map_err(|e| e.to_string())
    }

    /// Resolve `kid` to a verifying key, refreshing once on a miss.
    pub async fn verifying_key(&self, kid: &str) -> Result<VerifyingKey, AgentError> {
        if let Some(jwk) = self.cache.read().find(kid) {
            return jwk_to_verifying_key(jwk).map_err(|e| AgentError::TokenInvalid(e.to_string()));
        }
        debug!(kid, "kid not cached, forcing jwks refresh");
        self.refresh().await?;
        match self.cache.read().find(kid) {
            Some(jwk) => jwk_to_verifying_key(jwk).map_err(|e| AgentError::TokenInvalid(e.to_string())),
            None => Err(AgentError::KeyNotFound(kid.to_string())),
        }
    }

    /// Run the periodic refresh loop until `shutdown` is cancelled.
    pub fn spawn(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.refresh().await {
                            warn!(err = %e, "periodic jwks refresh failed, serving cached keys");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verifying_key_returns_key_not_found_when_gateway_unreachable() {
        let fetcher = JwksFetcher::new("http://127.0.0.1:1/v1/jwks");
        let err = fetcher.verifying_key("missing-kid").await.unwrap_err();
        assert!(matches!(err, AgentError::JwksFetchFailed(_)));
    }

    #[test]
    fn empty_cache_has_no_keys() {
        let fetcher = JwksFetcher::new("http://example.invalid/v1/jwks");
        assert!(fetcher.cache.read().find("anything").is_none());
    }
}
