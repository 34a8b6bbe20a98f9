// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy store: CRUD, versioning, content hashing (§4.3).

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::{Policy, Rule};

pub const DEFAULT_MAX_POLICIES: usize = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("policy {0:?} already exists")]
    AlreadyExists(String),
    #[error("policy {0:?} not found")]
    NotFound(String),
    #[error("version {1} of policy {0:?} not found")]
    VersionNotFound(String, u64),
    #[error("policy store is at capacity ({0})")]
    AtCapacity(usize),
}

struct PolicyRecord {
    current: Policy,
    history: Vec<Policy>,
}

/// Content hash over a canonical serialization of a rule list (§3): SHA-256
/// of each rule's stable fields, joined in rule order.
pub fn content_hash(rules: &[Rule]) -> String {
    let mut hasher = Sha256::new();
    for rule in rules {
        hasher.update(rule.id.as_bytes());
        hasher.update([rule.effect as u8]);
        hasher.update(rule.priority.to_be_bytes());
        for action in &rule.actions {
            hasher.update(action.as_bytes());
        }
        for condition in &rule.conditions {
            hasher.update(condition.field.as_bytes());
            hasher.update(format!("{:?}", condition.operator).as_bytes());
            hasher.update(condition.value.to_string().as_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

pub struct PolicyStore {
    records: RwLock<HashMap<String, PolicyRecord>>,
    max_policies: usize,
}

impl PolicyStore {
    pub fn new() -> Self {
        PolicyStore::with_capacity(DEFAULT_MAX_POLICIES)
    }

    pub fn with_capacity(max_policies: usize) -> Self {
        PolicyStore {
            records: RwLock::new(HashMap::new()),
            max_policies,
        }
    }

    pub fn create(&self, id: &str, name: &str, rules: Vec<Rule>) -> Result<Policy, StoreError> {
        let mut records = self.records.write();
        if records.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        if records.len() >= self.max_policies {
            return Err(StoreError::AtCapacity(self.max_policies));
        }
        let now = Utc::now();
        let policy = Policy {
            id: id.to_string(),
            version: 1,
            name: name.to_string(),
            content_hash: content_hash(&rules),
            rules,
            created_at: now,
            updated_at: now,
        };
        records.insert(
            id.to_string(),
            PolicyRecord {
                current: policy.clone(),
                history: Vec::new(),
            },
        );
        Ok(policy)
    }

    pub fn update(&self, id: &str, name: Option<String>, rules: Vec<Rule>) -> Result<Policy, StoreError> {
        let mut records = self.records.write();
        let record = records.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let previous = record.current.clone();
        let next = Policy {
            id: id.to_string(),
            version: previous.version + 1,
            name: name.unwrap_or_else(|| previous.name.clone()),
            content_hash: content_hash(&rules),
            rules,
            created_at: previous.created_at,
            updated_at: Utc::now(),
        };
        record.history.push(previous);
        record.current = next.clone();
        Ok(next)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write();
        records.remove(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Policy> {
        self.records.read().get(id).map(|r| r.current.clone())
    }

    pub fn get_by_version(&self, id: &str, version: u64) -> Result<Policy, StoreError> {
        let records = self.records.read();
        let record = records.get(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if record.current.version == version {
            return Ok(record.current.clone());
        }
        record
            .history
            .iter()
            .find(|p| p.version == version)
            .cloned()
            .ok_or_else(|| StoreError::VersionNotFound(id.to_string(), version))
    }

    pub fn list(&self) -> Vec<Policy> {
        self.records.read().values().map(|r| r.current.clone()).collect()
    }

    pub fn get_version_history(&self, id: &str) -> Result<Vec<Policy>, StoreError> {
        let records = self.records.read();
        let record = records.get(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut history = record.history.clone();
        history.push(record.current.clone());
        Ok(history)
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        PolicyStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Effect, Rule};

    fn sample_rule() -> Rule {
        Rule {
            id: "r1".to_string(),
            effect: Effect::Allow,
            priority: 1,
            actions: vec!["teleop:view".to_string()],
            conditions: vec![],
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let store = PolicyStore::new();
        let created = store.create("pol-1", "base", vec![sample_rule()]).unwrap();
        let fetched = store.get("pol-1").unwrap();
        assert_eq!(created.content_hash, fetched.content_hash);
        assert_eq!(fetched.version, 1);
    }

    #[test]
    fn create_on_existing_id_fails() {
        let store = PolicyStore::new();
        store.create("pol-1", "base", vec![sample_rule()]).unwrap();
        assert_eq!(
            store.create("pol-1", "base", vec![sample_rule()]),
            Err(StoreError::AlreadyExists("pol-1".to_string()))
        );
    }

    #[test]
    fn update_increments_version_and_retains_history() {
        let store = PolicyStore::new();
        store.create("pol-1", "base", vec![sample_rule()]).unwrap();
        let updated = store.update("pol-1", None, vec![]).unwrap();
        assert_eq!(updated.version, 2);
        let history = store.get_version_history("pol-1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[1].version, 2);
    }

    #[test]
    fn update_changes_content_hash_when_rules_change() {
        let store = PolicyStore::new();
        let original = store.create("pol-1", "base", vec![sample_rule()]).unwrap();
        let updated = store.update("pol-1", None, vec![]).unwrap();
        assert_ne!(original.content_hash, updated.content_hash);
    }

    #[test]
    fn delete_removes_policy() {
        let store = PolicyStore::new();
        store.create("pol-1", "base", vec![sample_rule()]).unwrap();
        store.delete("pol-1").unwrap();
        assert!(store.get("pol-1").is_none());
    }

    #[test]
    fn enforces_capacity_cap() {
        let store = PolicyStore::with_capacity(1);
        store.create("pol-1", "base", vec![sample_rule()]).unwrap();
        assert_eq!(
            store.create("pol-2", "base", vec![sample_rule()]),
            Err(StoreError::AtCapacity(1))
        );
    }

    #[test]
    fn content_hash_is_stable_for_identical_rules() {
        assert_eq!(content_hash(&[sample_rule()]), content_hash(&[sample_rule()]));
    }
}
