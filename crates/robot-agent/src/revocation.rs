// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Revocation handler (§4.13): reacts to a `revoked{session_id, reason}`
//! signaling message by closing the transport, terminating the session,
//! and driving the safety monitor's revocation trigger, capturing the
//! exact message-received-to-safe-stop timestamp sequence.

use std::sync::Arc;

use teleop_audit::{AuditEvent, AuditEventType, AuditPublisher};
use tracing::info;

use crate::safety::SafetyMonitor;
use crate::session::RobotSessionManager;
use crate::transport::DatachannelTransport;

pub struct RevocationHandler {
    session: Arc<RobotSessionManager>,
    safety: Arc<SafetyMonitor>,
    transport: Arc<dyn DatachannelTransport>,
    audit: Arc<AuditPublisher>,
    robot_id: String,
}

impl RevocationHandler {
    pub fn new(
        session: Arc<RobotSessionManager>,
        safety: Arc<SafetyMonitor>,
        transport: Arc<dyn DatachannelTransport>,
        audit: Arc<AuditPublisher>,
        robot_id: impl Into<String>,
    ) -> Self {
        RevocationHandler { session, safety, transport, audit, robot_id: robot_id.into() }
    }

    /// Handle one `revoked{session_id, reason}` signaling message. The
    /// timestamp sequence is MessageReceived -> HandlerStarted ->
    /// TransportClosed -> SessionTerminated -> SafeStopTriggered ->
    /// (onSafeStop internally records SafeStopCompleted).
    pub fn handle(&self, session_id: &str, reason: &str) {
        let message_received_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        info!(session_id, reason, "handler started for revocation");

        self.safety.begin_revocation_measurement(message_received_ms);

        self.transport.close();
        self.session.terminate();
        let _ = self.safety.on_revoked();

        self.audit.publish(
            AuditEvent::new(AuditEventType::SessionRevoked, session_id, self.robot_id.as_str())
                .with_metadata("reason", serde_json::json!(reason)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::RecordingHardwareStop;
    use crate::jwks::JwksFetcher;
    use crate::transport::RecordingTransport;
    use teleop_audit::{AuditSink, SinkError};
    use teleop_proto::RobotSessionState;

    struct NoopSink;

    #[async_trait::async_trait]
    impl AuditSink for NoopSink {
        async fn write(&self, _event: &AuditEvent) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn handle_closes_transport_terminates_session_and_triggers_safety() {
        let jwks = Arc::new(JwksFetcher::new("http://example.invalid/v1/jwks"));
        let session = Arc::new(RobotSessionManager::new("robot-1", jwks, 60));
        let transport = Arc::new(RecordingTransport::new());
        let hardware = Arc::new(RecordingHardwareStop::default());
        let safety = Arc::new(SafetyMonitor::new("sess-1", "robot-1", 10, hardware, transport.clone()));
        let shutdown = tokio_util::sync::CancellationToken::new();
        let (audit, _handle) = AuditPublisher::spawn(Arc::new(NoopSink), shutdown);

        let handler = RevocationHandler::new(session.clone(), safety, transport.clone(), Arc::new(audit), "robot-1");
        handler.handle("sess-1", "operator offboarded");

        assert!(transport.is_closed());
        assert_eq!(session.state(), RobotSessionState::Terminated);
        assert!(transport.sent().iter().any(|m| matches!(m, teleop_proto::DataChannelMessage::State { .. })));
    }
}
