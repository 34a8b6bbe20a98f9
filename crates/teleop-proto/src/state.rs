// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session and robot state enums (§3, §6).

use serde::{Deserialize, Serialize};

/// Gateway's view of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewaySessionState {
    Pending,
    Active,
    Terminated,
    Revoked,
}

/// Robot's view of a session. Linear `Idle -> Validating -> Active ->
/// Terminated`, with `Active -> SafeStop -> Terminated` as the safety
/// branch. `SafeStop` is terminal for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotSessionState {
    Idle,
    Validating,
    Active,
    SafeStop,
    Terminated,
}

/// Robot state as observed over the datachannel (`state{robot_state}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotState {
    Idle,
    Active,
    SafeStop,
    SafeStopFailed,
}

impl RobotSessionState {
    pub fn can_activate(self) -> bool {
        matches!(self, RobotSessionState::Validating)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RobotSessionState::Terminated)
    }
}
