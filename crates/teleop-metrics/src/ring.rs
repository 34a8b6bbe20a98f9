// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The thread-safe fixed-size ring buffer shared by all four collectors
//! (§4.15).

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub avg_ms: f64,
}

impl Stats {
    fn empty() -> Self {
        Stats {
            count: 0,
            min_ms: 0.0,
            max_ms: 0.0,
            p50_ms: 0.0,
            p95_ms: 0.0,
            avg_ms: 0.0,
        }
    }
}

pub struct RingBuffer {
    capacity: usize,
    samples: Mutex<VecDeque<f64>>,
}

impl RingBuffer {
    /// `capacity` of 0 is interpreted as the default of 1000 (§4.15).
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        RingBuffer {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, value_ms: f64) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(value_ms);
    }

    /// Snapshot the buffer and compute sort-based quantiles.
    pub fn stats(&self) -> Stats {
        let mut sorted: Vec<f64> = self.samples.lock().iter().copied().collect();
        if sorted.is_empty() {
            return Stats::empty();
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        Stats {
            count,
            min_ms: sorted[0],
            max_ms: sorted[count - 1],
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
            avg_ms: sum / count as f64,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Nearest-rank percentile over an already-sorted slice.
fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (fraction * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_defaults_to_1000() {
        let ring = RingBuffer::new(0);
        for i in 0..1200 {
            ring.record(i as f64);
        }
        assert_eq!(ring.len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn oldest_samples_are_evicted_past_capacity() {
        let ring = RingBuffer::new(3);
        ring.record(1.0);
        ring.record(2.0);
        ring.record(3.0);
        ring.record(4.0);
        let stats = ring.stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_ms, 2.0);
        assert_eq!(stats.max_ms, 4.0);
    }

    #[test]
    fn computes_quantiles_over_known_distribution() {
        let ring = RingBuffer::new(100);
        for i in 1..=100 {
            ring.record(i as f64);
        }
        let stats = ring.stats();
        assert_eq!(stats.count, 100);
        assert!((stats.p50_ms - 50.0).abs() <= 1.0);
        assert!((stats.p95_ms - 95.0).abs() <= 1.0);
        assert_eq!(stats.min_ms, 1.0);
        assert_eq!(stats.max_ms, 100.0);
    }

    #[test]
    fn empty_buffer_reports_zeroed_stats() {
        let ring = RingBuffer::new(10);
        assert_eq!(ring.stats().count, 0);
    }
}
