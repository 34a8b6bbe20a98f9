// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, non-blocking audit publisher shared by the Gateway and the
//! Robot Agent (§4.14).

mod publisher;
mod sink;

pub use publisher::{AuditPublisher, PublisherMetrics};
pub use sink::{AuditSink, HttpAuditSink, SinkError};

pub use teleop_proto::{AuditEvent, AuditEventType};
