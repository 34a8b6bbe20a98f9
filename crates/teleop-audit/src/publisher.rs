// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The publisher itself: a bounded channel plus one draining worker task.
//! `publish` never blocks and never awaits (§4.14, §5).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use teleop_proto::AuditEvent;

use crate::sink::AuditSink;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
pub struct PublisherMetrics {
    pub enqueued: AtomicU64,
    pub dropped: AtomicU64,
    pub send_failures: AtomicU64,
}

impl PublisherMetrics {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.enqueued.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
            self.send_failures.load(Ordering::Relaxed),
        )
    }
}

pub struct AuditPublisher {
    sender: mpsc::Sender<AuditEvent>,
    metrics: Arc<PublisherMetrics>,
}

impl AuditPublisher {
    /// Spawn the worker and return the publisher handle. The worker drains
    /// `sink.write()` one event at a time until `shutdown` is cancelled, at
    /// which point it drains whatever remains in the channel buffer and
    /// returns (the Gateway/Robot Agent shutdown path gives this a bounded
    /// grace period, §9).
    pub fn spawn(sink: Arc<dyn AuditSink>, shutdown: CancellationToken) -> (Self, tokio::task::JoinHandle<()>) {
        Self::spawn_with_capacity(sink, shutdown, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn spawn_with_capacity(
        sink: Arc<dyn AuditSink>,
        shutdown: CancellationToken,
        capacity: usize,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel(capacity);
        let metrics = Arc::new(PublisherMetrics::default());
        let worker_metrics = metrics.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        while let Ok(event) = receiver.try_recv() {
                            if let Err(e) = sink.write(&event).await {
                                warn!(err = %e, "audit event dropped during shutdown drain");
                                worker_metrics.send_failures.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        break;
                    }
                    maybe_event = receiver.recv() => {
                        match maybe_event {
                            Some(event) => {
                                if let Err(e) = sink.write(&event).await {
                                    debug!(err = %e, "audit publish failed, dropping event");
                                    worker_metrics.send_failures.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        });

        (AuditPublisher { sender, metrics }, handle)
    }

    /// Enqueue `event` without blocking. On a full queue, the event is
    /// dropped and `dropped` is incremented — the caller is never made to
    /// wait on the audit path.
    pub fn publish(&self, event: AuditEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {
                self.metrics.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn metrics(&self) -> Arc<PublisherMetrics> {
        self.metrics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use teleop_proto::AuditEventType;

    struct RecordingSink {
        received: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl AuditSink for RecordingSink {
        async fn write(&self, event: &AuditEvent) -> Result<(), crate::sink::SinkError> {
            self.received.lock().unwrap().push(event.session_id.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_does_not_block_and_drains_to_sink() {
        let sink = Arc::new(RecordingSink {
            received: Mutex::new(Vec::new()),
        });
        let shutdown = CancellationToken::new();
        let (publisher, handle) = AuditPublisher::spawn(sink.clone(), shutdown.clone());

        publisher.publish(AuditEvent::new(AuditEventType::SessionRequested, "sess-1", "robot-1"));
        publisher.publish(AuditEvent::new(AuditEventType::SessionGranted, "sess-1", "robot-1"));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(sink.received.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn overflow_drops_newest_and_counts_it() {
        struct SlowSink;
        #[async_trait::async_trait]
        impl AuditSink for SlowSink {
            async fn write(&self, _event: &AuditEvent) -> Result<(), crate::sink::SinkError> {
                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                Ok(())
            }
        }

        let shutdown = CancellationToken::new();
        let (publisher, _handle) = AuditPublisher::spawn_with_capacity(Arc::new(SlowSink), shutdown.clone(), 1);

        for i in 0..5 {
            publisher.publish(AuditEvent::new(
                AuditEventType::PrivilegedAction,
                format!("sess-{i}"),
                "robot-1",
            ));
        }

        let (enqueued, dropped, _) = publisher.metrics().snapshot();
        assert!(dropped > 0, "expected at least one dropped event, enqueued={enqueued} dropped={dropped}");
        shutdown.cancel();
    }
}
