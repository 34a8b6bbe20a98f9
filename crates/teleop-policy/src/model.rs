// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy and rule data model (§3).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Neq,
    In,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub effect: Effect,
    pub priority: i64,
    pub actions: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub version: u64,
    pub name: String,
    pub rules: Vec<Rule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub content_hash: String,
}

/// Evaluation context: credential attributes merged with runtime context
/// (time, requested resource, requested action), addressed by dot path.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    fields: BTreeMap<String, Value>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        EvaluationContext::default()
    }

    pub fn with(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(path.into(), value.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(path.into(), value.into());
    }

    /// Resolve a dot-separated field path. Top-level keys are matched
    /// directly; nested paths (`credential.department`) fall back to
    /// walking a JSON object stored under the path's first segment.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(path) {
            return Some(value);
        }
        let mut segments = path.split('.');
        let root = segments.next()?;
        let mut current = self.fields.get(root)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }
}
