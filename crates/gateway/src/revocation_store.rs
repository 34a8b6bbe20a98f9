// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSON persistence for the revocation cache (§4.5, §6).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::RevocationEntry;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to read revocation file: {0}")]
    Read(String),
    #[error("revocation file is not valid JSON: {0}")]
    Parse(String),
    #[error("failed to write revocation file: {0}")]
    Write(String),
}

/// On-disk record shape: `{jti, revokedAt, expiresAt, reason?}` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RevocationRecord {
    jti: String,
    #[serde(rename = "revokedAt")]
    revoked_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl From<&RevocationEntry> for RevocationRecord {
    fn from(entry: &RevocationEntry) -> Self {
        RevocationRecord {
            jti: entry.token_id.clone(),
            revoked_at: entry.revoked_at,
            expires_at: entry.expires_at,
            reason: entry.reason.clone(),
        }
    }
}

impl From<RevocationRecord> for RevocationEntry {
    fn from(record: RevocationRecord) -> Self {
        RevocationEntry {
            token_id: record.jti,
            revoked_at: record.revoked_at,
            expires_at: record.expires_at,
            reason: record.reason,
        }
    }
}

/// Read every entry from `path`. A missing file is not an error; a
/// permission or parse failure is (§4.5).
pub fn load(path: &Path) -> Result<Vec<RevocationEntry>, PersistError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PersistError::Read(e.to_string())),
    };
    let records: Vec<RevocationRecord> =
        serde_json::from_str(&contents).map_err(|e| PersistError::Parse(e.to_string()))?;
    Ok(records.into_iter().map(RevocationEntry::from).collect())
}

/// Re-read `path`, append `entry`, and rewrite atomically via a temp file
/// plus rename.
pub fn append(path: &Path, entry: &RevocationEntry) -> Result<(), PersistError> {
    let mut entries = load(path)?;
    entries.push(entry.clone());
    let records: Vec<RevocationRecord> = entries.iter().map(RevocationRecord::from).collect();
    let json = serde_json::to_string_pretty(&records).map_err(|e| PersistError::Write(e.to_string()))?;

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json).map_err(|e| PersistError::Write(e.to_string()))?;
    std::fs::rename(&tmp_path, path).map_err(|e| PersistError::Write(e.to_string()))?;
    Ok(())
}

/// Append `entry` on a blocking-pool task; failure is logged, never
/// propagated to the caller, so an in-memory revocation never waits on
/// disk I/O (§4.5).
pub fn append_detached(path: PathBuf, entry: RevocationEntry) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = append(&path, &entry) {
            tracing::warn!(err = %e, token_id = %entry.token_id, "failed to persist revocation entry");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(token_id: &str, now: DateTime<Utc>) -> RevocationEntry {
        RevocationEntry {
            token_id: token_id.to_string(),
            revoked_at: now,
            expires_at: now + Duration::seconds(60),
            reason: Some("admin".to_string()),
        }
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = std::env::temp_dir().join(format!("gateway-revocation-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("revocations.json");
        assert_eq!(load(&path).unwrap(), Vec::new());
    }

    #[test]
    fn append_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("gateway-revocation-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("revocations.json");
        let now = Utc::now();

        append(&path, &entry("t1", now)).unwrap();
        append(&path, &entry("t2", now)).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].token_id, "t1");
        assert_eq!(loaded[1].token_id, "t2");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn malformed_file_is_a_hard_error() {
        let dir = std::env::temp_dir().join(format!("gateway-revocation-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("revocations.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(load(&path), Err(PersistError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }
}
