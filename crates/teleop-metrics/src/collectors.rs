// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The four measurement domains named in §4.15, each a thin wrapper over a
//! [`RingBuffer`] that knows how to turn its domain's timestamp tuple into
//! one duration sample.

use crate::ring::{RingBuffer, Stats};

/// Timestamps captured across one session's setup, all monotonic millis
/// relative to an arbitrary epoch shared within a process.
#[derive(Debug, Clone, Copy)]
pub struct SessionSetupTimestamps {
    pub offer_received_ms: u64,
    pub token_validated_ms: u64,
    pub peer_connection_created_ms: u64,
    pub connection_established_ms: u64,
    pub session_activated_ms: u64,
    pub data_channel_ready_ms: u64,
    pub answer_sent_ms: u64,
}

pub struct SessionSetupCollector {
    ring: RingBuffer,
}

impl SessionSetupCollector {
    pub fn new(capacity: usize) -> Self {
        SessionSetupCollector { ring: RingBuffer::new(capacity) }
    }

    /// Records the offer-to-datachannel-ready span as one sample.
    pub fn record(&self, timestamps: SessionSetupTimestamps) {
        let duration = timestamps
            .data_channel_ready_ms
            .saturating_sub(timestamps.offer_received_ms) as f64;
        self.ring.record(duration);
    }

    pub fn stats(&self) -> Stats {
        self.ring.stats()
    }
}

/// Matches `ping{seq,t_mono}` against the returning `pong{seq,t_mono,
/// t_recv}` to compute a monotonic-clock RTT sample.
pub struct ControlRttCollector {
    ring: RingBuffer,
}

impl ControlRttCollector {
    pub fn new(capacity: usize) -> Self {
        ControlRttCollector { ring: RingBuffer::new(capacity) }
    }

    /// `sent_mono_ns` is the `t_mono` the ping carried; `received_mono_ns`
    /// is the local monotonic clock reading when the matching pong arrived.
    pub fn record_round_trip(&self, sent_mono_ns: u64, received_mono_ns: u64) {
        let rtt_ms = received_mono_ns.saturating_sub(sent_mono_ns) as f64 / 1_000_000.0;
        self.ring.record(rtt_ms);
    }

    pub fn stats(&self) -> Stats {
        self.ring.stats()
    }
}

/// One video-latency sample: the emitted `frame_timestamp` correlated with
/// the operator's decoded-frame presentation time.
pub struct VideoLatencySample {
    pub frame_timestamp_ms: u64,
    pub presented_at_ms: u64,
}

/// Clock offsets beyond this are flagged, not corrected (§4.15, §9).
pub const CLOCK_OFFSET_FLAG_THRESHOLD_MS: f64 = 100.0;

pub struct VideoLatencyCollector {
    ring: RingBuffer,
}

impl VideoLatencyCollector {
    pub fn new(capacity: usize) -> Self {
        VideoLatencyCollector { ring: RingBuffer::new(capacity) }
    }

    /// Returns `true` when the observed offset exceeds the flag threshold.
    pub fn record(&self, sample: VideoLatencySample) -> bool {
        let latency_ms = sample.presented_at_ms.saturating_sub(sample.frame_timestamp_ms) as f64;
        self.ring.record(latency_ms);
        latency_ms.abs() > CLOCK_OFFSET_FLAG_THRESHOLD_MS
    }

    pub fn stats(&self) -> Stats {
        self.ring.stats()
    }
}

/// The timestamp tuple from the robot's revocation handler (§4.13).
#[derive(Debug, Clone, Copy)]
pub struct RevocationTimestamps {
    pub message_received_ms: u64,
    pub safe_stop_completed_ms: u64,
}

pub struct RevocationLatencyCollector {
    ring: RingBuffer,
}

impl RevocationLatencyCollector {
    pub fn new(capacity: usize) -> Self {
        RevocationLatencyCollector { ring: RingBuffer::new(capacity) }
    }

    pub fn record(&self, timestamps: RevocationTimestamps) {
        let duration = timestamps
            .safe_stop_completed_ms
            .saturating_sub(timestamps.message_received_ms) as f64;
        self.ring.record(duration);
    }

    pub fn stats(&self) -> Stats {
        self.ring.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_setup_records_offer_to_ready_span() {
        let collector = SessionSetupCollector::new(10);
        collector.record(SessionSetupTimestamps {
            offer_received_ms: 1000,
            token_validated_ms: 1010,
            peer_connection_created_ms: 1020,
            connection_established_ms: 1200,
            session_activated_ms: 1210,
            data_channel_ready_ms: 1300,
            answer_sent_ms: 1015,
        });
        assert_eq!(collector.stats().avg_ms, 300.0);
    }

    #[test]
    fn control_rtt_computes_nanosecond_diff_in_millis() {
        let collector = ControlRttCollector::new(10);
        collector.record_round_trip(0, 5_000_000);
        assert_eq!(collector.stats().avg_ms, 5.0);
    }

    #[test]
    fn video_latency_flags_offsets_beyond_threshold() {
        let collector = VideoLatencyCollector::new(10);
        let flagged = collector.record(VideoLatencySample {
            frame_timestamp_ms: 1000,
            presented_at_ms: 1150,
        });
        assert!(flagged);
        let not_flagged = collector.record(VideoLatencySample {
            frame_timestamp_ms: 1000,
            presented_at_ms: 1050,
        });
        assert!(!not_flagged);
    }

    #[test]
    fn revocation_latency_records_message_to_safe_stop_span() {
        let collector = RevocationLatencyCollector::new(10);
        collector.record(RevocationTimestamps {
            message_received_ms: 2000,
            safe_stop_completed_ms: 2080,
        });
        assert_eq!(collector.stats().avg_ms, 80.0);
    }
}
