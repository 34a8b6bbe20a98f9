// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datachannel message kinds (§4.10, §6).
//!
//! All messages are JSON text. `t` fields are Unix milliseconds; `t_mono`
//! fields are peer-local monotonic nanoseconds used only for self-paired
//! ping/pong.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_code::DataChannelErrorCode;
use crate::state::RobotState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataChannelMessage {
    Auth {
        token: String,
    },
    Drive {
        v: f64,
        w: f64,
        t: u64,
    },
    KvmKey {
        key: String,
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modifiers: Option<Vec<String>>,
        t: u64,
    },
    KvmMouse {
        dx: f64,
        dy: f64,
        buttons: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scroll: Option<f64>,
        t: u64,
    },
    EStop {
        t: u64,
    },
    Ping {
        seq: u64,
        t_mono: u64,
    },
    Pong {
        seq: u64,
        t_mono: u64,
        t_recv: u64,
    },
    FrameTimestamp {
        timestamp: u64,
        frame_id: u64,
        sequence_number: u64,
    },
    Ack {
        ref_type: String,
        ref_t: u64,
    },
    Error {
        code: DataChannelErrorCode,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ref_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ref_t: Option<u64>,
    },
    State {
        robot_state: RobotState,
        session_state: String,
        t: u64,
    },
}

impl DataChannelMessage {
    pub fn type_tag(&self) -> &'static str {
        match self {
            DataChannelMessage::Auth { .. } => "auth",
            DataChannelMessage::Drive { .. } => "drive",
            DataChannelMessage::KvmKey { .. } => "kvm_key",
            DataChannelMessage::KvmMouse { .. } => "kvm_mouse",
            DataChannelMessage::EStop { .. } => "e_stop",
            DataChannelMessage::Ping { .. } => "ping",
            DataChannelMessage::Pong { .. } => "pong",
            DataChannelMessage::FrameTimestamp { .. } => "frame_timestamp",
            DataChannelMessage::Ack { .. } => "ack",
            DataChannelMessage::Error { .. } => "error",
            DataChannelMessage::State { .. } => "state",
        }
    }

    pub fn error(code: DataChannelErrorCode, reason: impl Into<String>) -> Self {
        DataChannelMessage::Error {
            code,
            reason: reason.into(),
            ref_type: None,
            ref_t: None,
        }
    }

    /// Read just the `type` discriminant from a raw JSON payload, without
    /// committing to decoding the rest of the envelope. Used by the router
    /// to distinguish "unparseable" from "unknown type" per §4.10.
    pub fn peek_type(raw: &str) -> Result<String, serde_json::Error> {
        #[derive(Deserialize)]
        struct Head {
            #[serde(rename = "type")]
            ty: String,
        }
        let head: Head = serde_json::from_str(raw)?;
        Ok(head.ty)
    }

    pub fn is_known_type(tag: &str) -> bool {
        matches!(
            tag,
            "auth"
                | "drive"
                | "kvm_key"
                | "kvm_mouse"
                | "e_stop"
                | "ping"
                | "pong"
                | "frame_timestamp"
                | "ack"
                | "error"
                | "state"
        )
    }
}

/// Raw, not-yet-validated JSON body paired with its `type` tag, used while
/// the router is still deciding whether a handler exists.
#[derive(Debug, Clone)]
pub struct RawEnvelope {
    pub type_tag: String,
    pub body: Value,
}
