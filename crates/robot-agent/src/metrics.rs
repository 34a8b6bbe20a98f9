// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the four measurement collectors named in §4.15 to this process
//! and produces the combined report the runner compares against NFR-P1…P4.

use teleop_metrics::{
    ControlRttCollector, Report, RevocationLatencyCollector, SessionSetupCollector, Target,
    VideoLatencyCollector, DEFAULT_CAPACITY,
};

pub struct AgentMetrics {
    pub session_setup: SessionSetupCollector,
    pub control_rtt: ControlRttCollector,
    pub video_latency: VideoLatencyCollector,
    pub revocation_latency: RevocationLatencyCollector,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl AgentMetrics {
    pub fn with_capacity(capacity: usize) -> Self {
        AgentMetrics {
            session_setup: SessionSetupCollector::new(capacity),
            control_rtt: ControlRttCollector::new(capacity),
            video_latency: VideoLatencyCollector::new(capacity),
            revocation_latency: RevocationLatencyCollector::new(capacity),
        }
    }

    /// Compare each collector's observed p95 against its NFR target
    /// (`None` targets are taken from the LAN/WAN profile the runner
    /// passes in explicitly, per §4.15).
    pub fn reports(&self, targets: &MetricTargets) -> Vec<Report> {
        vec![
            teleop_metrics::report("session_setup", self.session_setup.stats(), targets.session_setup),
            teleop_metrics::report("control_rtt", self.control_rtt.stats(), targets.control_rtt),
            teleop_metrics::report("video_latency", self.video_latency.stats(), targets.video_latency),
            teleop_metrics::report("revocation_latency", self.revocation_latency.stats(), targets.revocation_latency),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricTargets {
    pub session_setup: Option<Target>,
    pub control_rtt: Option<Target>,
    pub video_latency: Option<Target>,
    pub revocation_latency: Option<Target>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use teleop_metrics::{RevocationTimestamps, SessionSetupTimestamps};

    #[test]
    fn reports_cover_all_four_domains() {
        let metrics = AgentMetrics::with_capacity(10);
        metrics.session_setup.record(SessionSetupTimestamps {
            offer_received_ms: 0,
            token_validated_ms: 5,
            peer_connection_created_ms: 10,
            connection_established_ms: 50,
            session_activated_ms: 55,
            data_channel_ready_ms: 80,
            answer_sent_ms: 60,
        });
        metrics.control_rtt.record_round_trip(0, 4_000_000);
        metrics.revocation_latency.record(RevocationTimestamps { message_received_ms: 0, safe_stop_completed_ms: 40 });

        let reports = metrics.reports(&MetricTargets::default());
        assert_eq!(reports.len(), 4);
        assert!(reports.iter().all(|r| r.meets_target));
    }
}
