// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level orchestration: connects the signaling socket, reconnects with
//! backoff on disconnect, and wires the session manager, router, rate
//! limiter, safety monitor and revocation handler around whatever
//! datachannel transport is plugged in for this run (§5, §9).

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use teleop_audit::{AuditPublisher, HttpAuditSink};
use teleop_proto::signaling::{PeerRole, SignalMessage};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RobotAgentConfig;
use crate::hardware::UninitializedHardwareStop;
use crate::jwks::{JwksFetcher, DEFAULT_REFRESH_INTERVAL};
use crate::metrics::AgentMetrics;
use crate::rate_limit::RateLimiter;
use crate::revocation::RevocationHandler;
use crate::router::DatachannelRouter;
use crate::safety::SafetyMonitor;
use crate::session::RobotSessionManager;
use crate::transport::{DatachannelTransport, RecordingTransport};

const RECONNECT_ATTEMPTS: u32 = 5;

/// Every long-lived collaborator a running agent owns; split out so tests
/// can build it without a live signaling socket.
pub struct Runtime {
    pub session: Arc<RobotSessionManager>,
    pub safety: Arc<SafetyMonitor>,
    pub router: Arc<DatachannelRouter>,
    pub rate_limiter: Arc<RateLimiter>,
    pub revocation: Arc<RevocationHandler>,
    pub metrics: Arc<AgentMetrics>,
    pub jwks: Arc<JwksFetcher>,
}

impl Runtime {
    pub fn build(config: &RobotAgentConfig, transport: Arc<dyn DatachannelTransport>, shutdown: CancellationToken) -> Self {
        let jwks = Arc::new(JwksFetcher::new(config.gateway_jwks_url.clone()));
        jwks.clone().spawn(DEFAULT_REFRESH_INTERVAL, shutdown.clone());

        let session = Arc::new(RobotSessionManager::new(config.robot_id.clone(), jwks.clone(), 60));

        let sink = Arc::new(HttpAuditSink::new(&config.gateway_http_url()));
        let (audit, _audit_handle) = AuditPublisher::spawn(sink, shutdown.clone());
        let audit = Arc::new(audit);

        let metrics = Arc::new(AgentMetrics::default());

        let safety = Arc::new(
            SafetyMonitor::new(
                String::new(),
                config.robot_id.clone(),
                config.invalid_cmd_threshold,
                Arc::new(UninitializedHardwareStop),
                transport.clone(),
            )
            .with_audit(audit.clone())
            .with_revocation_collector(Arc::new(teleop_metrics::RevocationLatencyCollector::new(
                teleop_metrics::DEFAULT_CAPACITY,
            ))),
        );

        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_drive_hz, config.rate_limit_kvm_hz));
        let router = Arc::new(register_handlers(safety.clone(), rate_limiter.clone()));
        let revocation =
            Arc::new(RevocationHandler::new(session.clone(), safety.clone(), transport, audit, config.robot_id.clone()));

        Runtime { session, safety, router, rate_limiter, revocation, metrics, jwks }
    }
}

/// Register a handler for every known datachannel message kind (§4.10).
/// `drive`/`kvm_key`/`kvm_mouse` consult the rate limiter before touching
/// the safety monitor's control-loss clock; anything rejected there is
/// reported by the router as an invalid command, per §4.11's note that
/// rate-limit violations never feed the invalid-command counter.
fn register_handlers(safety: Arc<SafetyMonitor>, rate_limiter: Arc<RateLimiter>) -> DatachannelRouter {
    use teleop_proto::{DataChannelErrorCode, DataChannelMessage};

    let router = DatachannelRouter::new();

    router.register(
        "ping",
        Arc::new(|msg: DataChannelMessage| -> Result<Option<DataChannelMessage>, String> {
            let DataChannelMessage::Ping { seq, t_mono } = msg else {
                return Err("expected ping".to_string());
            };
            Ok(Some(DataChannelMessage::Pong { seq, t_mono, t_recv: t_mono }))
        }),
    );

    router.register("frame_timestamp", Arc::new(|_msg: DataChannelMessage| Ok(None)));
    router.register("ack", Arc::new(|_msg: DataChannelMessage| Ok(None)));

    let safety_for_estop = safety.clone();
    router.register(
        "e_stop",
        Arc::new(move |_msg: DataChannelMessage| -> Result<Option<DataChannelMessage>, String> {
            if safety_for_estop.is_safe_stopped() {
                return Ok(Some(DataChannelMessage::error(DataChannelErrorCode::SafeStopped, "already safe-stopped")));
            }
            let _ = safety_for_estop.on_e_stop();
            Ok(None)
        }),
    );

    let safety_for_drive = safety.clone();
    let limiter_for_drive = rate_limiter.clone();
    router.register(
        "drive",
        Arc::new(move |msg: DataChannelMessage| -> Result<Option<DataChannelMessage>, String> {
            if safety_for_drive.is_safe_stopped() {
                return Ok(Some(DataChannelMessage::error(DataChannelErrorCode::SafeStopped, "robot is safe-stopped")));
            }
            if !limiter_for_drive.admit(crate::rate_limit::Channel::Drive) {
                return Err("drive channel rate limit exceeded".to_string());
            }
            let DataChannelMessage::Drive { .. } = msg else { return Err("expected drive".to_string()) };
            safety_for_drive.note_successful_command();
            Ok(None)
        }),
    );

    let safety_for_kvm_key = safety.clone();
    let limiter_for_kvm_key = rate_limiter.clone();
    router.register(
        "kvm_key",
        Arc::new(move |msg: DataChannelMessage| -> Result<Option<DataChannelMessage>, String> {
            if safety_for_kvm_key.is_safe_stopped() {
                return Ok(Some(DataChannelMessage::error(DataChannelErrorCode::SafeStopped, "robot is safe-stopped")));
            }
            if !limiter_for_kvm_key.admit(crate::rate_limit::Channel::Kvm) {
                return Err("kvm channel rate limit exceeded".to_string());
            }
            let DataChannelMessage::KvmKey { .. } = msg else { return Err("expected kvm_key".to_string()) };
            safety_for_kvm_key.note_successful_command();
            Ok(None)
        }),
    );

    let safety_for_kvm_mouse = safety;
    let limiter_for_kvm_mouse = rate_limiter;
    router.register(
        "kvm_mouse",
        Arc::new(move |msg: DataChannelMessage| -> Result<Option<DataChannelMessage>, String> {
            if safety_for_kvm_mouse.is_safe_stopped() {
                return Ok(Some(DataChannelMessage::error(DataChannelErrorCode::SafeStopped, "robot is safe-stopped")));
            }
            if !limiter_for_kvm_mouse.admit(crate::rate_limit::Channel::Kvm) {
                return Err("kvm channel rate limit exceeded".to_string());
            }
            let DataChannelMessage::KvmMouse { .. } = msg else { return Err("expected kvm_mouse".to_string()) };
            safety_for_kvm_mouse.note_successful_command();
            Ok(None)
        }),
    );

    router
}

/// Connect to the Gateway's signaling endpoint, join as the robot peer for
/// `session_id`, and relay `offer`/`answer`/`ice` to the (out-of-scope)
/// realtime transport layer until disconnected or revoked.
pub async fn run_signaling_loop(
    config: &RobotAgentConfig,
    session_id: &str,
    revocation: Arc<RevocationHandler>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    for attempt in 0..RECONNECT_ATTEMPTS {
        if shutdown.is_cancelled() {
            return Ok(());
        }
        match connect_once(config, session_id, &revocation, &shutdown).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                warn!(attempt = attempt + 1, err = %e, ?delay, "signaling connection failed, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => return Ok(()),
                }
            }
        }
    }
    anyhow::bail!("exhausted signaling reconnect attempts")
}

async fn connect_once(
    config: &RobotAgentConfig,
    session_id: &str,
    revocation: &Arc<RevocationHandler>,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(&config.gateway_ws_url).await?;
    let (mut write, mut read) = ws_stream.split();

    let join = SignalMessage::Join { session_id: session_id.to_string(), role: PeerRole::Robot, token: None };
    write.send(Message::Text(serde_json::to_string(&join)?.into())).await?;
    info!(session_id, "joined signaling room as robot");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<SignalMessage>(&text) {
                            Ok(SignalMessage::Revoked { session_id, reason }) => {
                                revocation.handle(&session_id, &reason);
                            }
                            Ok(SignalMessage::Offer { .. } | SignalMessage::Answer { .. } | SignalMessage::Ice { .. }) => {
                                // Peer-connection establishment is an external capability (Non-goal).
                            }
                            Ok(SignalMessage::SessionState { session_id, state }) => {
                                info!(%session_id, %state, "session state update");
                            }
                            Ok(SignalMessage::Error { code, message }) => {
                                warn!(%code, %message, "signaling error");
                            }
                            Ok(_) => {}
                            Err(e) => warn!(err = %e, "malformed signaling message"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(e.into()),
                    _ => {}
                }
            }
        }
    }
}

/// Default datachannel transport before a real peer connection is wired
/// in; kept so the agent can run end-to-end in tests and local dev.
pub fn default_transport() -> Arc<dyn DatachannelTransport> {
    Arc::new(RecordingTransport::new())
}

/// Process entrypoint: build the runtime, start the control-loss ticker,
/// and drive the signaling loop until shutdown or exhausted reconnects.
pub async fn run(config: RobotAgentConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let runtime = Runtime::build(&config, default_transport(), shutdown.clone());

    let control_loss_timeout = Duration::from_millis(config.control_loss_timeout_ms);
    let safety_for_ticker = runtime.safety.clone();
    let ticker_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(control_loss_timeout);
        loop {
            tokio::select! {
                _ = ticker_shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let _ = safety_for_ticker.check_control_loss(control_loss_timeout);
                }
            }
        }
    });

    let result = run_signaling_loop(&config, &config.session_id, runtime.revocation.clone(), shutdown.clone()).await;
    shutdown.cancel();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runtime_builds_with_all_collaborators_wired() {
        let config = RobotAgentConfig {
            robot_id: "robot-1".to_string(),
            session_id: "sess-1".to_string(),
            gateway_ws_url: "ws://127.0.0.1:1/v1/signal".to_string(),
            gateway_jwks_url: "http://127.0.0.1:1/v1/jwks".to_string(),
            gateway_http_url: None,
            camera_device: None,
            video_codec: None,
            video_bitrate: None,
            video_fps: None,
            control_loss_timeout_ms: 500,
            rate_limit_drive_hz: 50,
            rate_limit_kvm_hz: 100,
            invalid_cmd_threshold: 10,
            stun_servers: vec![],
            turn_servers: vec![],
            log_format: "json".to_string(),
            log_level: "info".to_string(),
        };
        let shutdown = CancellationToken::new();
        let runtime = Runtime::build(&config, default_transport(), shutdown.clone());
        assert!(runtime.rate_limiter.admit(crate::rate_limit::Channel::Drive));
        shutdown.cancel();
    }

    #[test]
    fn drive_after_safe_stop_is_rejected_with_safe_stopped() {
        use crate::hardware::RecordingHardwareStop;
        use crate::transport::RecordingTransport;
        use teleop_proto::{DataChannelErrorCode, DataChannelMessage};

        let hardware = Arc::new(RecordingHardwareStop::default());
        let transport = Arc::new(RecordingTransport::new());
        let safety = Arc::new(SafetyMonitor::new("sess-1", "robot-1", 10, hardware, transport.clone() as Arc<dyn DatachannelTransport>));
        let rate_limiter = Arc::new(RateLimiter::new(50, 100));
        let router = register_handlers(safety.clone(), rate_limiter);

        assert!(safety.on_e_stop().is_some());

        router.dispatch(r#"{"type":"drive","v":0.1,"w":0.0,"t":1}"#, transport.as_ref()).unwrap();

        match &transport.sent().last().unwrap() {
            DataChannelMessage::Error { code, .. } => assert_eq!(*code, DataChannelErrorCode::SafeStopped),
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
