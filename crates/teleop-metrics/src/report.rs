// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Comparison of observed quantiles against configured latency targets
//! (NFR-P1…NFR-P4, §4.15). LAN vs WAN profiles are the runner's choice;
//! this module just compares whatever target it is given.

use serde::Serialize;

use crate::ring::Stats;

#[derive(Debug, Clone, Copy)]
pub struct Target {
    pub p95_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub name: String,
    pub observed: Stats,
    pub target_p95_ms: Option<f64>,
    pub meets_target: bool,
}

pub fn report(name: &str, observed: Stats, target: Option<Target>) -> Report {
    let meets_target = match target {
        Some(t) => observed.p95_ms <= t.p95_ms,
        None => true,
    };
    Report {
        name: name.to_string(),
        observed,
        target_p95_ms: target.map(|t| t.p95_ms),
        meets_target,
    }
}

impl Report {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn to_human(&self) -> String {
        match self.target_p95_ms {
            Some(target) => format!(
                "{}: n={} p50={:.1}ms p95={:.1}ms (target {:.1}ms) -> {}",
                self.name,
                self.observed.count,
                self.observed.p50_ms,
                self.observed.p95_ms,
                target,
                if self.meets_target { "MEETS TARGET" } else { "MISSES TARGET" }
            ),
            None => format!(
                "{}: n={} p50={:.1}ms p95={:.1}ms (no target configured)",
                self.name, self.observed.count, self.observed.p50_ms, self.observed.p95_ms
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingBuffer;

    #[test]
    fn flags_target_miss() {
        let ring = RingBuffer::new(10);
        for _ in 0..10 {
            ring.record(150.0);
        }
        let r = report("control-rtt", ring.stats(), Some(Target { p95_ms: 100.0 }));
        assert!(!r.meets_target);
        assert!(r.to_human().contains("MISSES TARGET"));
    }

    #[test]
    fn no_target_always_meets() {
        let ring = RingBuffer::new(10);
        ring.record(5.0);
        let r = report("video-latency", ring.stats(), None);
        assert!(r.meets_target);
        assert!(r.to_json().is_object());
    }
}
