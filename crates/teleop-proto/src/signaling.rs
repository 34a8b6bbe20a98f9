// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signaling-hub WebSocket messages (§6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    Operator,
    Robot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    Join {
        session_id: String,
        role: PeerRole,
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    Offer {
        session_id: String,
        sdp: String,
    },
    Answer {
        session_id: String,
        sdp: String,
    },
    Ice {
        session_id: String,
        candidate: IceCandidate,
    },
    Leave {
        session_id: String,
    },
    SessionState {
        session_id: String,
        state: String,
    },
    Revoked {
        session_id: String,
        reason: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl SignalMessage {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            SignalMessage::Join { session_id, .. }
            | SignalMessage::Offer { session_id, .. }
            | SignalMessage::Answer { session_id, .. }
            | SignalMessage::Ice { session_id, .. }
            | SignalMessage::Leave { session_id }
            | SignalMessage::SessionState { session_id, .. }
            | SignalMessage::Revoked { session_id, .. } => Some(session_id),
            SignalMessage::Error { .. } => None,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        SignalMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
