// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide shared state (§9 "Global mutable state"): one key manager,
//! token registry, revocation cache, trusted-issuer set, policy store,
//! audit queue and signaling hub, constructed at startup and torn down in
//! reverse order on shutdown.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use teleop_audit::AuditPublisher;
use teleop_crypto::{DidCache, KeyManager, TrustedIssuerSet};
use teleop_policy::PolicyStore;

use crate::config::GatewayConfig;
use crate::hub::SignalingHub;
use crate::ledger::{LedgerAuditSink, LoggingAuditSink};
use crate::near_expiry::NearExpiryMonitor;
use crate::registry::TokenRegistry;
use crate::revocation_store;

pub struct GatewayState {
    pub config: GatewayConfig,
    pub key_manager: KeyManager,
    pub registry: Arc<TokenRegistry>,
    pub policy_store: PolicyStore,
    pub trusted_issuers: TrustedIssuerSet,
    pub did_cache: Mutex<DidCache>,
    pub audit: AuditPublisher,
    pub hub: SignalingHub,
    pub shutdown: CancellationToken,
}

impl GatewayState {
    /// Construct shared state, loading persisted revocations from disk. A
    /// missing revocation file is not an error; a malformed one is (§4.5).
    pub fn new(
        config: GatewayConfig,
        shutdown: CancellationToken,
    ) -> anyhow::Result<(Arc<Self>, tokio::task::JoinHandle<()>)> {
        let registry = Arc::new(TokenRegistry::new(config.revocation_cache_size));

        let persisted = revocation_store::load(&config.revocation_file)?;
        let loaded = persisted.len();
        registry.revocation.load(persisted, Utc::now());
        if loaded > 0 {
            info!(count = loaded, "loaded persisted revocations");
        }

        let sink: Arc<dyn teleop_audit::AuditSink> = match &config.audit_ledger_url {
            Some(url) => Arc::new(LedgerAuditSink::new(url)),
            None => Arc::new(LoggingAuditSink),
        };
        let (audit, audit_worker) =
            AuditPublisher::spawn_with_capacity(sink, shutdown.clone(), config.audit_queue_capacity);

        let state = Arc::new(GatewayState {
            did_cache: Mutex::new(DidCache::with_defaults()),
            key_manager: KeyManager::generate_ephemeral(),
            registry,
            policy_store: PolicyStore::with_capacity(config.policy_store_capacity),
            trusted_issuers: TrustedIssuerSet::new(),
            audit,
            hub: SignalingHub::new(),
            shutdown,
            config,
        });

        Ok((state, audit_worker))
    }

    /// Spawn the registry-cleanup and near-expiry-monitor background
    /// tickers. Both stop when `self.shutdown` is cancelled (§9).
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        let cleanup_registry = Arc::clone(&self.registry);
        let cleanup_interval = self.config.revocation_cleanup_interval();
        let cleanup_shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cleanup_shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = Utc::now();
                        let expired = cleanup_registry.cleanup(now);
                        let pruned = cleanup_registry.revocation.prune_expired(now);
                        if expired > 0 || pruned > 0 {
                            info!(
                                expired_tokens = expired,
                                pruned_revocations = pruned,
                                hit_rate = cleanup_registry.revocation.metrics.hit_rate(),
                                "revocation cleanup pass"
                            );
                        }
                    }
                }
            }
        });

        NearExpiryMonitor::spawn(
            Arc::clone(&self.registry),
            self.config.near_expiry_scan_interval(),
            self.config.near_expiry_warn_threshold(),
            self.shutdown.clone(),
        );
    }

    /// Revoke every token for `session_id`, push `revoked` to its hub room
    /// and persist each new revocation. Returns the number of tokens
    /// revoked; zero for an unknown session is an idempotent no-op (§9
    /// open question).
    pub fn revoke_session(&self, session_id: &str, reason: Option<String>) -> usize {
        let now = Utc::now();
        let revoked = self.registry.revoke_by_session(session_id, reason.clone(), now);
        if revoked > 0 {
            self.hub.revoke(session_id, reason.as_deref().unwrap_or("revoked"));
            for entry in self.registry.revocation.snapshot() {
                if entry.revoked_at == now {
                    revocation_store::append_detached(self.config.revocation_file.clone(), entry);
                }
            }
        }
        revoked
    }

    /// Revoke every token for `operator_id` across all of its sessions.
    pub fn revoke_operator(&self, operator_id: &str, reason: Option<String>) -> Vec<String> {
        let now = Utc::now();
        let sessions = self.registry.revoke_by_operator(operator_id, reason.clone(), now);
        for session_id in &sessions {
            self.hub.revoke(session_id, reason.as_deref().unwrap_or("revoked"));
        }
        if sessions.is_empty() {
            warn!(operator_id, "revocation request matched no active sessions");
        }
        for entry in self.registry.revocation.snapshot() {
            if entry.revoked_at == now {
                revocation_store::append_detached(self.config.revocation_file.clone(), entry);
            }
        }
        sessions
    }
}
