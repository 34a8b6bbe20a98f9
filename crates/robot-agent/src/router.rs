// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datachannel router (§4.10): demultiplexes inbound JSON messages to
//! registered handlers, enforces protocol-level error reporting, and is
//! re-entrant per message so concurrent dispatch at high message rates
//! does not race on the handler registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use teleop_proto::{DataChannelErrorCode, DataChannelMessage};

use crate::transport::DatachannelTransport;

/// A handler for exactly one message type tag. Returns `Ok(Some(..))` to
/// send a response, `Ok(None)` to acknowledge silently, or `Err(reason)`
/// to have the router emit `error{INVALID_MESSAGE, reason}` on its behalf.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: DataChannelMessage) -> Result<Option<DataChannelMessage>, String>;
}

impl<F> MessageHandler for F
where
    F: Fn(DataChannelMessage) -> Result<Option<DataChannelMessage>, String> + Send + Sync,
{
    fn handle(&self, message: DataChannelMessage) -> Result<Option<DataChannelMessage>, String> {
        self(message)
    }
}

/// Read-mostly handler registry keyed by the wire `type` tag (§4.10).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<&'static str, Arc<dyn MessageHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, type_tag: &'static str, handler: Arc<dyn MessageHandler>) {
        self.handlers.write().insert(type_tag, handler);
    }

    fn get(&self, type_tag: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.read().get(type_tag).cloned()
    }
}

pub struct DatachannelRouter {
    registry: HandlerRegistry,
}

impl Default for DatachannelRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl DatachannelRouter {
    pub fn new() -> Self {
        DatachannelRouter { registry: HandlerRegistry::new() }
    }

    pub fn register(&self, type_tag: &'static str, handler: Arc<dyn MessageHandler>) {
        self.registry.register(type_tag, handler);
    }

    /// Dispatch one raw inbound payload per §4.10's algorithm. Send
    /// failures on the router's own error notifications are best-effort
    /// and swallowed; a send failure for a handler's successful response
    /// is returned to the caller.
    pub fn dispatch(&self, raw: &str, transport: &dyn DatachannelTransport) -> Result<(), String> {
        let type_tag = match DataChannelMessage::peek_type(raw) {
            Ok(tag) => tag,
            Err(_) => {
                let _ = transport.send(&DataChannelMessage::error(DataChannelErrorCode::InvalidMessage, "unparseable envelope"));
                return Ok(());
            }
        };

        if !DataChannelMessage::is_known_type(&type_tag) {
            let _ = transport.send(&DataChannelMessage::error(DataChannelErrorCode::UnknownType, format!("unknown type {type_tag:?}")));
            return Ok(());
        }

        let Some(handler) = self.registry.get(&type_tag) else {
            let _ = transport.send(&DataChannelMessage::error(DataChannelErrorCode::UnknownType, "no handler"));
            return Ok(());
        };

        let message: DataChannelMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(_) => {
                let _ = transport.send(&DataChannelMessage::error(DataChannelErrorCode::InvalidMessage, "schema violation"));
                return Ok(());
            }
        };

        match handler.handle(message) {
            Ok(Some(response)) => transport.send(&response).map_err(|e| e.to_string()),
            Ok(None) => Ok(()),
            Err(reason) => {
                let _ = transport.send(&DataChannelMessage::error(DataChannelErrorCode::InvalidMessage, reason));
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;

    #[test]
    fn unparseable_json_yields_invalid_message() {
        let router = DatachannelRouter::new();
        let transport = RecordingTransport::new();
        router.dispatch("not json", &transport).unwrap();
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], DataChannelMessage::Error { code: DataChannelErrorCode::InvalidMessage, .. }));
    }

    #[test]
    fn unknown_type_yields_unknown_type_error() {
        let router = DatachannelRouter::new();
        let transport = RecordingTransport::new();
        router.dispatch(r#"{"type":"teleport"}"#, &transport).unwrap();
        let sent = transport.sent();
        assert!(matches!(sent[0], DataChannelMessage::Error { code: DataChannelErrorCode::UnknownType, .. }));
    }

    #[test]
    fn known_type_without_handler_yields_unknown_type_with_no_handler_reason() {
        let router = DatachannelRouter::new();
        let transport = RecordingTransport::new();
        router.dispatch(r#"{"type":"ping","seq":1,"t_mono":0}"#, &transport).unwrap();
        let sent = transport.sent();
        match &sent[0] {
            DataChannelMessage::Error { code, reason, .. } => {
                assert_eq!(*code, DataChannelErrorCode::UnknownType);
                assert_eq!(reason, "no handler");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn registered_handler_response_is_sent() {
        let router = DatachannelRouter::new();
        router.register(
            "ping",
            Arc::new(|msg: DataChannelMessage| -> Result<Option<DataChannelMessage>, String> {
                let DataChannelMessage::Ping { seq, t_mono } = msg else { return Err("expected ping".to_string()) };
                Ok(Some(DataChannelMessage::Pong { seq, t_mono, t_recv: t_mono + 1 }))
            }),
        );
        let transport = RecordingTransport::new();
        router.dispatch(r#"{"type":"ping","seq":7,"t_mono":42}"#, &transport).unwrap();
        let sent = transport.sent();
        assert!(matches!(sent[0], DataChannelMessage::Pong { seq: 7, .. }));
    }

    #[test]
    fn handler_error_is_reported_as_invalid_message() {
        let router = DatachannelRouter::new();
        router.register("e_stop", Arc::new(|_msg: DataChannelMessage| -> Result<Option<DataChannelMessage>, String> {
            Err("hardware unavailable".to_string())
        }));
        let transport = RecordingTransport::new();
        router.dispatch(r#"{"type":"e_stop","t":1}"#, &transport).unwrap();
        match &transport.sent()[0] {
            DataChannelMessage::Error { code, reason, .. } => {
                assert_eq!(*code, DataChannelErrorCode::InvalidMessage);
                assert_eq!(reason, "hardware unavailable");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn handler_response_send_failure_is_returned_to_caller() {
        let router = DatachannelRouter::new();
        router.register("ping", Arc::new(|msg: DataChannelMessage| -> Result<Option<DataChannelMessage>, String> {
            let DataChannelMessage::Ping { seq, t_mono } = msg else { return Err("expected ping".to_string()) };
            Ok(Some(DataChannelMessage::Pong { seq, t_mono, t_recv: 0 }))
        }));
        let transport = RecordingTransport::new();
        transport.set_fail_sends(true);
        assert!(router.dispatch(r#"{"type":"ping","seq":1,"t_mono":0}"#, &transport).is_err());
    }
}
