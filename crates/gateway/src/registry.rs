// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token registry and revocation cache (§3, §4.5).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub token_id: String,
    pub session_id: String,
    pub operator_id: String,
    pub robot_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    pub token_id: String,
    pub revoked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }
}

/// Bounded mapping from token id to revocation record. At capacity,
/// inserts evict the oldest ⌈10%⌉ (minimum 1) by `revoked_at` (§4.5).
pub struct RevocationCache {
    entries: RwLock<HashMap<String, RevocationEntry>>,
    max_size: usize,
    pub metrics: CacheMetrics,
}

impl RevocationCache {
    pub fn new(max_size: usize) -> Self {
        RevocationCache {
            entries: RwLock::new(HashMap::new()),
            max_size,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn insert(&self, entry: RevocationEntry) {
        let mut entries = self.entries.write();
        if entries.len() >= self.max_size && !entries.contains_key(&entry.token_id) {
            self.evict_oldest(&mut entries);
        }
        entries.insert(entry.token_id.clone(), entry);
    }

    fn evict_oldest(&self, entries: &mut HashMap<String, RevocationEntry>) {
        let evict_count = ((entries.len() as f64 * 0.1).ceil() as usize).max(1);
        let mut by_age: Vec<(String, DateTime<Utc>)> =
            entries.iter().map(|(k, v)| (k.clone(), v.revoked_at)).collect();
        by_age.sort_by_key(|(_, revoked_at)| *revoked_at);
        for (key, _) in by_age.into_iter().take(evict_count) {
            entries.remove(&key);
            self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// `true` if the token is revoked and not yet past its original
    /// expiry. Expired entries are lazily dropped on lookup.
    pub fn is_revoked(&self, token_id: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.write();
        match entries.get(token_id) {
            Some(entry) if entry.expires_at > now => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                true
            }
            Some(_) => {
                entries.remove(token_id);
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                false
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prune every entry already past its original expiry.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn snapshot(&self) -> Vec<RevocationEntry> {
        self.entries.read().values().cloned().collect()
    }

    pub fn load(&self, entries: Vec<RevocationEntry>, now: DateTime<Utc>) {
        for entry in entries {
            if entry.expires_at > now {
                self.insert(entry);
            }
        }
    }
}

/// In-memory index of active tokens by token id, session id and operator id.
pub struct TokenRegistry {
    by_token: RwLock<HashMap<String, RegistryEntry>>,
    by_session: RwLock<HashMap<String, HashSet<String>>>,
    by_operator: RwLock<HashMap<String, HashSet<String>>>,
    pub revocation: RevocationCache,
}

impl TokenRegistry {
    pub fn new(revocation_cache_size: usize) -> Self {
        TokenRegistry {
            by_token: RwLock::new(HashMap::new()),
            by_session: RwLock::new(HashMap::new()),
            by_operator: RwLock::new(HashMap::new()),
            revocation: RevocationCache::new(revocation_cache_size),
        }
    }

    pub fn register(&self, entry: RegistryEntry) {
        self.by_session
            .write()
            .entry(entry.session_id.clone())
            .or_default()
            .insert(entry.token_id.clone());
        self.by_operator
            .write()
            .entry(entry.operator_id.clone())
            .or_default()
            .insert(entry.token_id.clone());
        self.by_token.write().insert(entry.token_id.clone(), entry);
    }

    /// `IsValid` per §4.5: the revocation cache is consulted first so a
    /// restarted Gateway still rejects revoked bearers before the registry
    /// has been reconstructed.
    pub fn is_valid(&self, token_id: &str, now: DateTime<Utc>) -> bool {
        if self.revocation.is_revoked(token_id, now) {
            return false;
        }
        match self.by_token.read().get(token_id) {
            Some(entry) => entry.expires_at > now,
            None => false,
        }
    }

    fn remove_from_indexes(&self, entry: &RegistryEntry) {
        if let Some(set) = self.by_session.write().get_mut(&entry.session_id) {
            set.remove(&entry.token_id);
        }
        if let Some(set) = self.by_operator.write().get_mut(&entry.operator_id) {
            set.remove(&entry.token_id);
        }
    }

    pub fn revoke(&self, token_id: &str, reason: Option<String>, now: DateTime<Utc>) -> bool {
        let entry = self.by_token.write().remove(token_id);
        match entry {
            Some(entry) => {
                self.remove_from_indexes(&entry);
                self.revocation.insert(RevocationEntry {
                    token_id: token_id.to_string(),
                    revoked_at: now,
                    expires_at: entry.expires_at,
                    reason,
                });
                true
            }
            None => false,
        }
    }

    pub fn revoke_by_session(&self, session_id: &str, reason: Option<String>, now: DateTime<Utc>) -> usize {
        let token_ids: Vec<String> = self
            .by_session
            .read()
            .get(session_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        let mut revoked = 0;
        for token_id in token_ids {
            if self.revoke(&token_id, reason.clone(), now) {
                revoked += 1;
            }
        }
        revoked
    }

    pub fn revoke_by_operator(&self, operator_id: &str, reason: Option<String>, now: DateTime<Utc>) -> Vec<String> {
        let entries: Vec<RegistryEntry> = {
            let by_token = self.by_token.read();
            self.by_operator
                .read()
                .get(operator_id)
                .map(|set| set.iter().filter_map(|tid| by_token.get(tid).cloned()).collect())
                .unwrap_or_default()
        };
        let mut sessions = HashSet::new();
        for entry in entries {
            if self.revoke(&entry.token_id, reason.clone(), now) {
                sessions.insert(entry.session_id);
            }
        }
        sessions.into_iter().collect()
    }

    pub fn get_by_session(&self, session_id: &str) -> Vec<RegistryEntry> {
        let by_token = self.by_token.read();
        self.by_session
            .read()
            .get(session_id)
            .map(|set| set.iter().filter_map(|tid| by_token.get(tid).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn get_by_operator(&self, operator_id: &str) -> Vec<RegistryEntry> {
        let by_token = self.by_token.read();
        self.by_operator
            .read()
            .get(operator_id)
            .map(|set| set.iter().filter_map(|tid| by_token.get(tid).cloned()).collect())
            .unwrap_or_default()
    }

    /// Remove registry (not revocation-cache) entries already past expiry.
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<RegistryEntry> = self
            .by_token
            .read()
            .values()
            .filter(|e| e.expires_at <= now)
            .cloned()
            .collect();
        for entry in &expired {
            self.by_token.write().remove(&entry.token_id);
            self.remove_from_indexes(entry);
        }
        expired.len()
    }

    pub fn all(&self) -> Vec<RegistryEntry> {
        self.by_token.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(token_id: &str, session_id: &str, operator_id: &str, expires_in_secs: i64, now: DateTime<Utc>) -> RegistryEntry {
        RegistryEntry {
            token_id: token_id.to_string(),
            session_id: session_id.to_string(),
            operator_id: operator_id.to_string(),
            robot_id: "robot-1".to_string(),
            expires_at: now + Duration::seconds(expires_in_secs),
        }
    }

    #[test]
    fn registered_token_is_valid_until_expiry() {
        let now = Utc::now();
        let registry = TokenRegistry::new(100);
        registry.register(entry("t1", "s1", "op1", 60, now));
        assert!(registry.is_valid("t1", now));
        assert!(!registry.is_valid("t1", now + Duration::seconds(61)));
    }

    #[test]
    fn revoked_token_is_invalid_even_before_registry_removal_race() {
        let now = Utc::now();
        let registry = TokenRegistry::new(100);
        registry.register(entry("t1", "s1", "op1", 60, now));
        registry.revoke("t1", Some("admin".to_string()), now);
        assert!(!registry.is_valid("t1", now));
    }

    #[test]
    fn revoke_by_session_revokes_all_session_tokens() {
        let now = Utc::now();
        let registry = TokenRegistry::new(100);
        registry.register(entry("t1", "s1", "op1", 60, now));
        registry.register(entry("t2", "s1", "op1", 60, now));
        let count = registry.revoke_by_session("s1", None, now);
        assert_eq!(count, 2);
        assert!(!registry.is_valid("t1", now));
        assert!(!registry.is_valid("t2", now));
    }

    #[test]
    fn revoke_by_operator_returns_distinct_sessions() {
        let now = Utc::now();
        let registry = TokenRegistry::new(100);
        registry.register(entry("t1", "s1", "op1", 60, now));
        registry.register(entry("t2", "s2", "op1", 60, now));
        let mut sessions = registry.revoke_by_operator("op1", None, now);
        sessions.sort();
        assert_eq!(sessions, vec!["s1".to_string(), "s2".to_string()]);
    }

    #[test]
    fn revoking_nonexistent_session_is_idempotent_no_op() {
        let now = Utc::now();
        let registry = TokenRegistry::new(100);
        assert_eq!(registry.revoke("ghost", None, now), false);
    }

    #[test]
    fn cleanup_removes_tokens_expiring_exactly_now() {
        let now = Utc::now();
        let registry = TokenRegistry::new(100);
        registry.register(entry("t1", "s1", "op1", 0, now));
        let removed = registry.cleanup(now);
        assert_eq!(removed, 1);
    }

    #[test]
    fn revocation_cache_evicts_oldest_on_overflow() {
        let now = Utc::now();
        let cache = RevocationCache::new(10);
        for i in 0..10 {
            cache.insert(RevocationEntry {
                token_id: format!("t{i}"),
                revoked_at: now + Duration::seconds(i),
                expires_at: now + Duration::seconds(3600),
                reason: None,
            });
        }
        assert_eq!(cache.len(), 10);
        cache.insert(RevocationEntry {
            token_id: "t10".to_string(),
            revoked_at: now + Duration::seconds(10),
            expires_at: now + Duration::seconds(3600),
            reason: None,
        });
        assert_eq!(cache.len(), 10);
        assert!(!cache.is_revoked("t0", now));
    }

    #[test]
    fn revocation_cache_capacity_plus_one_evicts_exactly_one() {
        let now = Utc::now();
        let cache = RevocationCache::new(2);
        cache.insert(RevocationEntry {
            token_id: "a".to_string(),
            revoked_at: now,
            expires_at: now + Duration::seconds(60),
            reason: None,
        });
        cache.insert(RevocationEntry {
            token_id: "b".to_string(),
            revoked_at: now + Duration::seconds(1),
            expires_at: now + Duration::seconds(60),
            reason: None,
        });
        cache.insert(RevocationEntry {
            token_id: "c".to_string(),
            revoked_at: now + Duration::seconds(2),
            expires_at: now + Duration::seconds(60),
            reason: None,
        });
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn expired_revocation_entry_is_dropped_on_lookup() {
        let now = Utc::now();
        let cache = RevocationCache::new(10);
        cache.insert(RevocationEntry {
            token_id: "t1".to_string(),
            revoked_at: now,
            expires_at: now + Duration::seconds(10),
            reason: None,
        });
        assert!(cache.is_revoked("t1", now));
        assert!(!cache.is_revoked("t1", now + Duration::seconds(11)));
        assert!(cache.is_empty());
    }
}
