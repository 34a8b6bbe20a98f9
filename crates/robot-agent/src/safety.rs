// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Safety monitor (§4.12): the four safe-stop triggers, the trigger latch
//! that makes onSafeStop orchestration exactly-once, and the orchestration
//! sequence itself. Every step here runs synchronously on the trigger
//! thread — no awaits between trigger and hardware stop (§5).

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use teleop_audit::{AuditEvent, AuditEventType, AuditPublisher};
use teleop_metrics::{RevocationLatencyCollector, RevocationTimestamps};
use teleop_proto::{DataChannelMessage, RobotState};
use tracing::{error, warn};

use crate::hardware::HardwareStop;
use crate::transport::DatachannelTransport;

/// Listed in priority-descending order; irrevocable once asserted (§4.12).
/// The monitor does not arbitrate between simultaneous triggers beyond
/// first-wins — whichever call observes the latch `Armed` runs onSafeStop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyTrigger {
    Revoked,
    EStop,
    ControlLoss,
    InvalidCmds,
}

#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub trigger: SafetyTrigger,
    pub timestamp: Instant,
    pub duration: Duration,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct InvalidCommandWindow {
    count: u32,
    window_started: Option<Instant>,
}

const INVALID_CMD_WINDOW: Duration = Duration::from_secs(30);

enum LatchState {
    Armed,
    Triggered,
}

/// One session's safety monitor. `Reset()` (called only by session
/// activation) returns it to `armed`.
pub struct SafetyMonitor {
    session_id: String,
    robot_id: String,
    invalid_cmd_threshold: u32,
    latch: Mutex<LatchState>,
    invalid_window: Mutex<InvalidCommandWindow>,
    last_message_at: Mutex<Instant>,
    hardware: Arc<dyn HardwareStop>,
    transport: Arc<dyn DatachannelTransport>,
    audit: Option<Arc<AuditPublisher>>,
    revocation_collector: Option<Arc<RevocationLatencyCollector>>,
    active_revocation_started_ms: Mutex<Option<u64>>,
}

impl SafetyMonitor {
    pub fn new(
        session_id: impl Into<String>,
        robot_id: impl Into<String>,
        invalid_cmd_threshold: u32,
        hardware: Arc<dyn HardwareStop>,
        transport: Arc<dyn DatachannelTransport>,
    ) -> Self {
        SafetyMonitor {
            session_id: session_id.into(),
            robot_id: robot_id.into(),
            invalid_cmd_threshold,
            latch: Mutex::new(LatchState::Armed),
            invalid_window: Mutex::new(InvalidCommandWindow::default()),
            last_message_at: Mutex::new(Instant::now()),
            hardware,
            transport,
            audit: None,
            revocation_collector: None,
            active_revocation_started_ms: Mutex::new(None),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditPublisher>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_revocation_collector(mut self, collector: Arc<RevocationLatencyCollector>) -> Self {
        self.revocation_collector = Some(collector);
        self
    }

    /// `Reset()`: return to `armed`. Only the session manager's activation
    /// path calls this.
    pub fn reset(&self) {
        *self.latch.lock() = LatchState::Armed;
        *self.invalid_window.lock() = InvalidCommandWindow::default();
        *self.last_message_at.lock() = Instant::now();
    }

    /// Starts measuring a revocation-latency sample; completed by
    /// `on_safe_stop`'s step 6 when triggered by [`SafetyTrigger::Revoked`].
    pub fn begin_revocation_measurement(&self, message_received_ms: u64) {
        *self.active_revocation_started_ms.lock() = Some(message_received_ms);
    }

    /// Call on every successfully-dispatched datachannel message; resets
    /// the control-loss clock and the invalid-command window.
    pub fn note_successful_command(&self) {
        *self.last_message_at.lock() = Instant::now();
        *self.invalid_window.lock() = InvalidCommandWindow::default();
    }

    /// `CheckControlLoss()`: fires when no message has arrived within
    /// `timeout` of an active session.
    pub fn check_control_loss(&self, timeout: Duration) -> Option<TransitionResult> {
        if self.last_message_at.lock().elapsed() >= timeout {
            self.fire(SafetyTrigger::ControlLoss)
        } else {
            None
        }
    }

    /// `OnInvalidCommand()`: counts inside a sliding 30s window; fires on
    /// the threshold-th invalid command (threshold 10 fires on the 10th).
    pub fn on_invalid_command(&self) -> Option<TransitionResult> {
        let crossed = {
            let mut window = self.invalid_window.lock();
            let now = Instant::now();
            let started = *window.window_started.get_or_insert(now);
            if now.duration_since(started) > INVALID_CMD_WINDOW {
                window.count = 0;
                window.window_started = Some(now);
            }
            window.count += 1;
            window.count >= self.invalid_cmd_threshold
        };
        if crossed {
            self.fire(SafetyTrigger::InvalidCmds)
        } else {
            None
        }
    }

    pub fn on_e_stop(&self) -> Option<TransitionResult> {
        self.fire(SafetyTrigger::EStop)
    }

    pub fn on_revoked(&self) -> Option<TransitionResult> {
        self.fire(SafetyTrigger::Revoked)
    }

    /// True once any trigger has latched; drive/kvm/e_stop dispatch must
    /// consult this before acting (§6, §8 Scenario 6).
    pub fn is_safe_stopped(&self) -> bool {
        matches!(*self.latch.lock(), LatchState::Triggered)
    }

    /// Idempotent: the first trigger to observe `Armed` latches
    /// `Triggered` and runs onSafeStop; every later call is a no-op.
    fn fire(&self, trigger: SafetyTrigger) -> Option<TransitionResult> {
        {
            let mut latch = self.latch.lock();
            match *latch {
                LatchState::Triggered => return None,
                LatchState::Armed => *latch = LatchState::Triggered,
            }
        }
        Some(self.on_safe_stop(trigger))
    }

    /// The onSafeStop orchestration sequence (§4.12), target p95 < 100ms.
    fn on_safe_stop(&self, trigger: SafetyTrigger) -> TransitionResult {
        let entry = Instant::now();

        let hardware_result = self.hardware.stop();

        if let Err(ref reason) = hardware_result {
            error!(session_id = %self.session_id, robot_id = %self.robot_id, %reason, "hardware-stop unavailable, safety trigger could not complete");
            let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
            let state_message = DataChannelMessage::State {
                robot_state: RobotState::SafeStopFailed,
                session_state: "safe_stop_failed".to_string(),
                t: now_ms,
            };
            if let Err(e) = self.transport.send(&state_message) {
                warn!(session_id = %self.session_id, err = %e, "failed to notify operator of safe-stop failure");
            }
            return TransitionResult {
                trigger,
                timestamp: entry,
                duration: Instant::now().duration_since(entry),
                error: Some("hardware-stop primitive unavailable".to_string()),
            };
        }

        if trigger == SafetyTrigger::InvalidCmds {
            if let Some(audit) = &self.audit {
                audit.publish(AuditEvent::new(
                    AuditEventType::InvalidCommandThreshold,
                    self.session_id.as_str(),
                    self.robot_id.as_str(),
                ));
            }
        }

        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let state_message = DataChannelMessage::State {
            robot_state: RobotState::SafeStop,
            session_state: "safe_stop".to_string(),
            t: now_ms,
        };
        if let Err(e) = self.transport.send(&state_message) {
            warn!(session_id = %self.session_id, err = %e, "failed to notify operator of safe-stop, continuing");
        }

        if trigger == SafetyTrigger::Revoked {
            if let (Some(collector), Some(started_ms)) =
                (&self.revocation_collector, self.active_revocation_started_ms.lock().take())
            {
                collector.record(RevocationTimestamps { message_received_ms: started_ms, safe_stop_completed_ms: now_ms });
            }
        }

        TransitionResult { trigger, timestamp: entry, duration: Instant::now().duration_since(entry), error: None }
    }
}
