// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ring-buffer collectors and quantile reporters for the four measurement
//! domains (§4.15).

pub mod collectors;
pub mod report;
pub mod ring;

pub use collectors::{
    ControlRttCollector, RevocationLatencyCollector, RevocationTimestamps, SessionSetupCollector,
    SessionSetupTimestamps, VideoLatencyCollector, VideoLatencySample, CLOCK_OFFSET_FLAG_THRESHOLD_MS,
};
pub use report::{report, Report, Target};
pub use ring::{RingBuffer, Stats, DEFAULT_CAPACITY};
