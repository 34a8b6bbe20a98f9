// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit sinks. The Robot Agent uses [`HttpAuditSink`] to POST to the
//! Gateway's ingest endpoint; the Gateway implements [`AuditSink`] directly
//! against its ledger transport (never over HTTP to itself), per §4.14.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use teleop_proto::AuditEvent;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("audit endpoint responded with status {0}")]
    HttpStatus(u16),
    #[error("audit request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, event: &AuditEvent) -> Result<(), SinkError>;
}

/// POSTs audit events as JSON to `<gateway>/v1/audit`.
pub struct HttpAuditSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAuditSink {
    pub fn new(gateway_http_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        HttpAuditSink {
            client,
            endpoint: format!("{}/v1/audit", gateway_http_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
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
