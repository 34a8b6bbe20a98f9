// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Gateway's own audit sinks. Unlike the Robot Agent, the Gateway
//! writes directly to the ledger transport rather than looping back
//! through its own `/v1/audit` endpoint (§4.14).

use std::time::Duration;

use async_trait::async_trait;

use teleop_audit::{AuditSink, SinkError};
use teleop_proto::AuditEvent;

/// POSTs audit events to the configured ledger transport URL.
pub struct LedgerAuditSink {
    client: reqwest::Client,
    endpoint: String,
}

impl LedgerAuditSink {
    pub fn new(ledger_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        LedgerAuditSink {
            client,
            endpoint: ledger_url.to_string(),
        }
    }
}

#[async_trait]
impl AuditSink for LedgerAuditSink {
    async fn write(&self, event: &AuditEvent) -> Result<(), SinkError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SinkError::HttpStatus(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Development fallback used when no ledger URL is configured: logs the
/// event and reports success. The ledger's consensus mechanism is an
/// external capability (§1 Non-goals), so this is not a substitute for it
/// in a production deployment.
pub struct LoggingAuditSink;

#[async_trait]
impl AuditSink for LoggingAuditSink {
    async fn write(&self, event: &AuditEvent) -> Result<(), SinkError> {
        tracing::info!(
            event_type = ?event.event_type,
            session_id = %event.session_id,
            robot_id = %event.robot_id,
            "audit event (no ledger url configured)"
        );
        Ok(())
    }
}
