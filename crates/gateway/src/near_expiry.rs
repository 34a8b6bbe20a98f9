// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Near-expiry warning monitor (§4.6).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::registry::TokenRegistry;

#[derive(Debug, Clone, PartialEq)]
pub struct NearExpiryWarning {
    pub token_id: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub remaining_ms: i64,
}

/// Emits at most one warning per token id until the token leaves the
/// registry, at which point it is dropped from the dedup set (§4.6).
pub struct NearExpiryMonitor {
    warned: Mutex<HashSet<String>>,
}

impl Default for NearExpiryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NearExpiryMonitor {
    pub fn new() -> Self {
        NearExpiryMonitor { warned: Mutex::new(HashSet::new()) }
    }

    /// Scan once; return warnings for tokens newly inside the threshold.
    pub fn scan(&self, registry: &TokenRegistry, warn_threshold: Duration, now: DateTime<Utc>) -> Vec<NearExpiryWarning> {
        let entries = registry.all();
        let threshold = chrono::Duration::from_std(warn_threshold).unwrap_or_else(|_| chrono::Duration::zero());

        let mut warned = self.warned.lock();
        let live_ids: HashSet<String> = entries.iter().map(|e| e.token_id.clone()).collect();
        warned.retain(|id| live_ids.contains(id));

        let mut warnings = Vec::new();
        for entry in entries {
            let remaining = entry.expires_at - now;
            if remaining > chrono::Duration::zero() && remaining <= threshold && warned.insert(entry.token_id.clone()) {
                warnings.push(NearExpiryWarning {
                    token_id: entry.token_id,
                    session_id: entry.session_id,
                    expires_at: entry.expires_at,
                    remaining_ms: remaining.num_milliseconds(),
                });
            }
        }
        warnings
    }

    /// Run the periodic scan loop until `shutdown` is cancelled.
    pub fn spawn(
        registry: Arc<TokenRegistry>,
        scan_interval: Duration,
        warn_threshold: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::new(NearExpiryMonitor::new());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        for warning in monitor.scan(&registry, warn_threshold, Utc::now()) {
                            info!(
                                token_id = %warning.token_id,
                                session_id = %warning.session_id,
                                remaining_ms = warning.remaining_ms,
                                "token nearing expiry"
                            );
                        }
                    }
                }
            }
        })
    }
}
