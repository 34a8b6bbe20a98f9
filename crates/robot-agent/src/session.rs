// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Robot session manager (§4.9): token validation, the
//! `idle -> validating -> active -> terminated` state machine with the
//! `active -> safe_stop -> terminated` safety branch, and a one-shot
//! token-validation cache for the session's lifetime.

use std::sync::Arc;

use parking_lot::Mutex;
use teleop_crypto::token::CapabilityToken;
use teleop_proto::RobotSessionState;

use crate::error::AgentError;
use crate::jwks::JwksFetcher;

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub operator_id: String,
    pub robot_id: String,
    pub scope: Vec<String>,
    pub token_id: String,
}

struct Inner {
    state: RobotSessionState,
    info: Option<SessionInfo>,
}

/// One robot-side session's lifecycle. `on_state_change` fires whenever
/// [`RobotSessionManager::activate`] or [`RobotSessionManager::terminate`]
/// moves the state machine, matching §4.9's state-change callback.
pub struct RobotSessionManager {
    robot_id: String,
    jwks: Arc<JwksFetcher>,
    clock_skew_secs: i64,
    inner: Mutex<Inner>,
    on_state_change: Box<dyn Fn(RobotSessionState) + Send + Sync>,
}

impl RobotSessionManager {
    pub fn new(robot_id: impl Into<String>, jwks: Arc<JwksFetcher>, clock_skew_secs: i64) -> Self {
        Self::with_state_change(robot_id, jwks, clock_skew_secs, |_| {})
    }

    pub fn with_state_change(
        robot_id: impl Into<String>,
        jwks: Arc<JwksFetcher>,
        clock_skew_secs: i64,
        on_state_change: impl Fn(RobotSessionState) + Send + Sync + 'static,
    ) -> Self {
        RobotSessionManager {
            robot_id: robot_id.into(),
            jwks,
            clock_skew_secs,
            inner: Mutex::new(Inner { state: RobotSessionState::Idle, info: None }),
            on_state_change: Box::new(on_state_change),
        }
    }

    pub fn state(&self) -> RobotSessionState {
        self.inner.lock().state
    }

    pub fn info(&self) -> Option<SessionInfo> {
        self.inner.lock().info.clone()
    }

    /// Decode, verify and bind a capability token to `session_id` (§4.9).
    /// Transitions `idle -> validating` regardless of outcome; the caller
    /// must still call [`RobotSessionManager::activate`] on success.
    pub async fn validate_token(&self, session_id: &str, raw_token: &str) -> Result<SessionInfo, AgentError> {
        {
            let mut inner = self.inner.lock();
            inner.state = RobotSessionState::Validating;
        }

        let token = CapabilityToken::decode(raw_token).map_err(|e| AgentError::TokenInvalid(e.to_string()))?;
        let verifying_key = self.jwks.verifying_key(&token.header.kid).await?;
        let now = chrono::Utc::now().timestamp();
        token
            .validate(&verifying_key, &self.robot_id, session_id, now, self.clock_skew_secs)
            .map_err(|e| {
                if e == teleop_crypto::error::CryptoError::Expired {
                    AgentError::TokenExpired
                } else {
                    AgentError::TokenInvalid(e.to_string())
                }
            })?;

        Ok(SessionInfo {
            session_id: session_id.to_string(),
            operator_id: token.payload.sub,
            robot_id: token.payload.aud,
            scope: token.payload.scope,
            token_id: token.payload.jti,
        })
    }

    /// `Activate(info)` (§4.9): cache the validated session and move to
    /// `active`. Only valid from `validating`.
    pub fn activate(&self, info: SessionInfo) {
        {
            let mut inner = self.inner.lock();
            if !inner.state.can_activate() {
                return;
            }
            inner.state = RobotSessionState::Active;
            inner.info = Some(info);
        }
        (self.on_state_change)(RobotSessionState::Active);
    }

    /// Move to `safe_stop`, the terminal safety branch from `active`.
    pub fn enter_safe_stop(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state != RobotSessionState::Active {
                return;
            }
            inner.state = RobotSessionState::SafeStop;
        }
        (self.on_state_change)(RobotSessionState::SafeStop);
    }

    /// `Terminate()` (§4.9): move to `terminated` from any non-terminal
    /// state and drop the cached session info.
    pub fn terminate(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.state = RobotSessionState::Terminated;
            inner.info = None;
        }
        (self.on_state_change)(RobotSessionState::Terminated);
    }
}
