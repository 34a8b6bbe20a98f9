// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datachannel error codes (§6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataChannelErrorCode {
    InvalidMessage,
    UnknownType,
    StaleCommand,
    RateLimited,
    Unauthorized,
    SafeStopped,
    SessionRevoked,
}

impl DataChannelErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataChannelErrorCode::InvalidMessage => "INVALID_MESSAGE",
            DataChannelErrorCode::UnknownType => "UNKNOWN_TYPE",
            DataChannelErrorCode::StaleCommand => "STALE_COMMAND",
            DataChannelErrorCode::RateLimited => "RATE_LIMITED",
            DataChannelErrorCode::Unauthorized => "UNAUTHORIZED",
            DataChannelErrorCode::SafeStopped => "SAFE_STOPPED",
            DataChannelErrorCode::SessionRevoked => "SESSION_REVOKED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&DataChannelErrorCode::RateLimited).unwrap();
        assert_eq!(json, "\"RATE_LIMITED\"");
    }
}
