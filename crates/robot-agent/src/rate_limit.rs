// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-channel token bucket rate limiting (§4.11). One bucket for drive
//! commands, one for KVM input; capacity equals the configured Hz, refill
//! at the configured Hz. Rate-limit violations are distinct from invalid
//! commands and never feed the safety monitor's invalid-command counter.

use parking_lot::Mutex;
use tokio::time::Instant;

struct Bucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(hz: u32) -> Self {
        let capacity = hz.max(1) as f64;
        Bucket { capacity, tokens: capacity, refill_per_sec: capacity, last_refill: Instant::now() }
    }

    fn try_take(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Drive,
    Kvm,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Drive => "drive",
            Channel::Kvm => "kvm",
        }
    }
}

/// Holds the two independent per-channel buckets named in §4.11.
pub struct RateLimiter {
    drive: Mutex<Bucket>,
    kvm: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(drive_hz: u32, kvm_hz: u32) -> Self {
        RateLimiter { drive: Mutex::new(Bucket::new(drive_hz)), kvm: Mutex::new(Bucket::new(kvm_hz)) }
    }

    /// Returns `true` when the command is admitted, `false` when it should
    /// be rejected with `error{RATE_LIMITED}` and not dispatched.
    pub fn admit(&self, channel: Channel) -> bool {
        let bucket = match channel {
            Channel::Drive => &self.drive,
            Channel::Kvm => &self.kvm,
        };
        bucket.lock().try_take(Instant::now())
    }
}
