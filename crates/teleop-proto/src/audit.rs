// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit event schema (§3). Emitted by both Gateway and Robot Agent and
//! carried, unvalidated past its own shape, to the audit pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on the number of metadata entries an event may carry; the
/// Gateway's HTTP ingest endpoint rejects oversized events with 413 (§6).
pub const MAX_METADATA_ENTRIES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    SessionRequested,
    SessionGranted,
    SessionDenied,
    SessionStarted,
    SessionEnded,
    SessionRevoked,
    PrivilegedAction,
    InvalidCommandThreshold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub session_id: String,
    pub robot_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_hash: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, session_id: impl Into<String>, robot_id: impl Into<String>) -> Self {
        AuditEvent {
            event_type,
            session_id: session_id.into(),
            robot_id: robot_id.into(),
            operator_id: None,
            timestamp: Utc::now(),
            policy_hash: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_operator(mut self, operator_id: impl Into<String>) -> Self {
        self.operator_id = Some(operator_id.into());
        self
    }

    pub fn with_policy_hash(mut self, policy_hash: impl Into<String>) -> Self {
        self.policy_hash = Some(policy_hash.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `true` when the event exceeds the metadata entry bound; the HTTP
    /// ingest handler maps this to a 413.
    pub fn exceeds_metadata_bound(&self) -> bool {
        self.metadata.len() > MAX_METADATA_ENTRIES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_optional_fields() {
        let event = AuditEvent::new(AuditEventType::SessionGranted, "sess-1", "robot-1")
            .with_operator("op-1")
            .with_policy_hash("abc123")
            .with_metadata("effective_scope", serde_json::json!(["teleop:view"]));
        assert_eq!(event.operator_id.as_deref(), Some("op-1"));
        assert_eq!(event.policy_hash.as_deref(), Some("abc123"));
        assert_eq!(event.metadata.len(), 1);
    }

    #[test]
    fn serializes_event_type_as_screaming_snake_case() {
        let event = AuditEvent::new(AuditEventType::SessionRevoked, "sess-1", "robot-1");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"SESSION_REVOKED\""));
    }

    #[test]
    fn flags_oversized_metadata() {
        let mut event = AuditEvent::new(AuditEventType::PrivilegedAction, "sess-1", "robot-1");
        for i in 0..(MAX_METADATA_ENTRIES + 1) {
            event = event.with_metadata(format!("k{i}"), serde_json::json!(i));
        }
        assert!(event.exceeds_metadata_bound());
    }
}
