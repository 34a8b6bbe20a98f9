// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol types shared by the Gateway and the Robot Agent.
//!
//! This crate is pure data: message schemas, error codes, scope strings and
//! state enums, plus the audit event shape. No I/O, no crypto, no policy
//! logic — those live in `teleop-crypto`, `teleop-policy` and `teleop-audit`.

pub mod audit;
pub mod datachannel;
pub mod error_code;
pub mod scope;
pub mod signaling;
pub mod state;

pub use audit::{AuditEvent, AuditEventType};
pub use datachannel::DataChannelMessage;
pub use error_code::DataChannelErrorCode;
pub use scope::{Action, Scope, ScopeParseError};
pub use signaling::{IceCandidate, PeerRole, SignalMessage};
pub use state::{GatewaySessionState, RobotSessionState, RobotState};
