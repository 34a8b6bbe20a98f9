// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow datachannel transport interface. The realtime peer connection
//! itself (SDP, ICE, SRTP, the reliable/ordered datachannel) is an
//! external capability and explicitly out of scope; the router, safety
//! monitor and revocation handler only ever see this trait.

use teleop_proto::DataChannelMessage;

use crate::error::AgentError;

/// A single peer's open datachannel, as seen by the robot side.
pub trait DatachannelTransport: Send + Sync {
    /// Send one message. Send failures are surfaced to the caller but
    /// never crash the router (§4.10); the safety monitor logs rather than
    /// propagates them (§4.12 step 5).
    fn send(&self, message: &DataChannelMessage) -> Result<(), AgentError>;

    /// Close the underlying connection (§4.13 `TransportClosed`).
    fn close(&self);
}

/// An in-memory transport used by tests and as the default before a real
/// peer connection is wired up.
#[derive(Default)]
pub struct RecordingTransport {
    sent: parking_lot::Mutex<Vec<DataChannelMessage>>,
    closed: std::sync::atomic::AtomicBool,
    fail_sends: std::sync::atomic::AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<DataChannelMessage> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl DatachannelTransport for RecordingTransport {
    fn send(&self, message: &DataChannelMessage) -> Result<(), AgentError> {
        if self.fail_sends.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AgentError::TransportSend("transport unavailable".to_string()));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_transport_captures_sent_messages() {
        let transport = RecordingTransport::new();
        transport.send(&DataChannelMessage::EStop { t: 1 }).unwrap();
        assert_eq!(transport.sent().len(), 1);
        assert!(!transport.is_closed());
        transport.close();
        assert!(transport.is_closed());
    }

    #[test]
    fn recording_transport_can_be_made_to_fail_sends() {
        let transport = RecordingTransport::new();
        transport.set_fail_sends(true);
        assert!(transport.send(&DataChannelMessage::EStop { t: 1 }).is_err());
    }
}
