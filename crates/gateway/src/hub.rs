// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session two-peer signaling rooms (§4.7).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use teleop_proto::signaling::{PeerRole, SignalMessage};

pub type PeerSender = mpsc::UnboundedSender<SignalMessage>;

struct RoomState {
    operator: Option<PeerSender>,
    robot: Option<PeerSender>,
}

impl RoomState {
    fn slot(&mut self, role: PeerRole) -> &mut Option<PeerSender> {
        match role {
            PeerRole::Operator => &mut self.operator,
            PeerRole::Robot => &mut self.robot,
        }
    }

    fn other(&self, role: PeerRole) -> Option<&PeerSender> {
        match role {
            PeerRole::Operator => self.robot.as_ref(),
            PeerRole::Robot => self.operator.as_ref(),
        }
    }

    fn both_present(&self) -> bool {
        self.operator.is_some() && self.robot.is_some()
    }

    fn is_empty(&self) -> bool {
        self.operator.is_none() && self.robot.is_none()
    }
}

/// A single session's room. `inner` is the single-writer serialization
/// point for all dispatch on this session (§4.7, §5); sends are
/// non-blocking channel pushes so the lock never spans I/O.
pub struct Room {
    session_id: String,
    inner: Mutex<RoomState>,
}

impl Room {
    fn new(session_id: String) -> Self {
        Room {
            session_id,
            inner: Mutex::new(RoomState { operator: None, robot: None }),
        }
    }

    /// Attach a peer. Returns `true` once both peers are present, in which
    /// case the caller is responsible for pushing `session_state: ready`.
    pub fn join(&self, role: PeerRole, sender: PeerSender) -> bool {
        let mut state = self.inner.lock();
        *state.slot(role) = Some(sender);
        state.both_present()
    }

    /// Relay `message` to the other peer. `false` means the other peer is
    /// not attached or its channel is closed.
    pub fn relay(&self, from: PeerRole, message: SignalMessage) -> bool {
        let state = self.inner.lock();
        match state.other(from) {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    pub fn send_to_both(&self, message: SignalMessage) {
        let state = self.inner.lock();
        if let Some(tx) = &state.operator {
            let _ = tx.send(message.clone());
        }
        if let Some(tx) = &state.robot {
            let _ = tx.send(message);
        }
    }

    /// Detach `role`, notifying the remaining peer with `leave`. Returns
    /// `true` once the room holds no peers, so the caller can tear it down.
    pub fn leave(&self, role: PeerRole) -> bool {
        let mut state = self.inner.lock();
        if let Some(tx) = state.other(role) {
            let _ = tx.send(SignalMessage::Leave {
                session_id: self.session_id.clone(),
            });
        }
        *state.slot(role) = None;
        state.is_empty()
    }
}

/// Process-wide map of per-session rooms. Rooms are independent of each
/// other; only dispatch within one room is ordered (§5).
pub struct SignalingHub {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl Default for SignalingHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingHub {
    pub fn new() -> Self {
        SignalingHub {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the room for `session_id`.
    pub fn room(&self, session_id: &str) -> Arc<Room> {
        if let Some(room) = self.rooms.read().get(session_id) {
            return Arc::clone(room);
        }
        let mut rooms = self.rooms.write();
        Arc::clone(
            rooms
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Room::new(session_id.to_string()))),
        )
    }

    pub fn remove_room(&self, session_id: &str) {
        self.rooms.write().remove(session_id);
    }

    /// Push `revoked{session_id, reason}` to both peers and tear down the
    /// room (§4.7, §4.8).
    pub fn revoke(&self, session_id: &str, reason: &str) {
        let room = self.rooms.read().get(session_id).cloned();
        if let Some(room) = room {
            room.send_to_both(SignalMessage::Revoked {
                session_id: session_id.to_string(),
                reason: reason.to_string(),
            });
        }
        self.remove_room(session_id);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_join_reports_both_present() {
        let hub = SignalingHub::new();
        let room = hub.room("sess-1");
        let (op_tx, _op_rx) = mpsc::unbounded_channel();
        let (robot_tx, _robot_rx) = mpsc::unbounded_channel();
        assert!(!room.join(PeerRole::Operator, op_tx));
        assert!(room.join(PeerRole::Robot, robot_tx));
    }

    #[test]
    fn relay_delivers_only_to_other_peer() {
        let hub = SignalingHub::new();
        let room = hub.room("sess-1");
        let (op_tx, mut op_rx) = mpsc::unbounded_channel();
        let (robot_tx, mut robot_rx) = mpsc::unbounded_channel();
        room.join(PeerRole::Operator, op_tx);
        room.join(PeerRole::Robot, robot_tx);

        assert!(room.relay(
            PeerRole::Operator,
            SignalMessage::Offer { session_id: "sess-1".into(), sdp: "v=0".into() }
        ));
        assert!(robot_rx.try_recv().is_ok());
        assert!(op_rx.try_recv().is_err());
    }

    #[test]
    fn relay_without_other_peer_fails() {
        let hub = SignalingHub::new();
        let room = hub.room("sess-1");
        let (op_tx, _op_rx) = mpsc::unbounded_channel();
        room.join(PeerRole::Operator, op_tx);
        assert!(!room.relay(PeerRole::Operator, SignalMessage::Leave { session_id: "sess-1".into() }));
    }

    #[test]
    fn leave_notifies_remaining_peer_and_reports_empty() {
        let hub = SignalingHub::new();
        let room = hub.room("sess-1");
        let (op_tx, mut op_rx) = mpsc::unbounded_channel();
        let (robot_tx, _robot_rx) = mpsc::unbounded_channel();
        room.join(PeerRole::Operator, op_tx);
        room.join(PeerRole::Robot, robot_tx);

        assert!(!room.leave(PeerRole::Robot));
        assert!(matches!(op_rx.try_recv(), Ok(SignalMessage::Leave { .. })));
        assert!(room.leave(PeerRole::Operator));
    }

    #[test]
    fn revoke_pushes_to_both_and_removes_room() {
        let hub = SignalingHub::new();
        let room = hub.room("sess-1");
        let (op_tx, mut op_rx) = mpsc::unbounded_channel();
        let (robot_tx, mut robot_rx) = mpsc::unbounded_channel();
        room.join(PeerRole::Operator, op_tx);
        room.join(PeerRole::Robot, robot_tx);

        hub.revoke("sess-1", "admin revoke");
        assert!(matches!(op_rx.try_recv(), Ok(SignalMessage::Revoked { .. })));
        assert!(matches!(robot_rx.try_recv(), Ok(SignalMessage::Revoked { .. })));
        assert_eq!(hub.room_count(), 0);
    }
}
