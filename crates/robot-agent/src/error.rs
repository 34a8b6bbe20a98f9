// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Robot-side error taxonomy (§7). Router and rate-limiter failures map to
//! a [`DataChannelErrorCode`] and are surfaced as `error` messages; safety
//! failures never propagate past [`crate::safety`].

use teleop_proto::DataChannelErrorCode;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("malformed datachannel envelope")]
    MalformedEnvelope,
    #[error("unknown datachannel message type {0:?}")]
    UnknownType(String),
    #[error("no handler registered for {0:?}")]
    NoHandler(String),
    #[error("token invalid: {0}")]
    TokenInvalid(String),
    #[error("token expired")]
    TokenExpired,
    #[error("rate limit exceeded on {0} channel")]
    RateLimited(&'static str),
    #[error("jwks fetch failed: {0}")]
    JwksFetchFailed(String),
    #[error("signing key {0:?} not found in jwks")]
    KeyNotFound(String),
    #[error("transport send failed: {0}")]
    TransportSend(String),
    #[error("hardware-stop primitive unavailable")]
    HardwareUnavailable,
}

impl AgentError {
    /// The datachannel error code this failure should be reported as, when
    /// it is router/rate-limiter-visible (§7 propagation policy). Safety
    /// and infrastructure errors have no wire representation and return
    /// `None` — they are logged and recorded, never sent.
    pub fn datachannel_code(&self) -> Option<DataChannelErrorCode> {
        match self {
            AgentError::MalformedEnvelope => Some(DataChannelErrorCode::InvalidMessage),
            AgentError::UnknownType(_) | AgentError::NoHandler(_) => {
                Some(DataChannelErrorCode::UnknownType)
            }
            AgentError::TokenInvalid(_) | AgentError::TokenExpired => {
                Some(DataChannelErrorCode::Unauthorized)
            }
            AgentError::RateLimited(_) => Some(DataChannelErrorCode::RateLimited),
            AgentError::JwksFetchFailed(_)
            | AgentError::KeyNotFound(_)
            | AgentError::TransportSend(_)
            | AgentError::HardwareUnavailable => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
