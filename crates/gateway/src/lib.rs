// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway: capability issuance, policy evaluation, the token registry and
//! revocation cache, the signaling hub, and the thin HTTP surface binding
//! them together (§4.1–§4.8).

pub mod config;
pub mod error;
pub mod hub;
pub mod ledger;
pub mod near_expiry;
pub mod registry;
pub mod revocation_store;
pub mod state;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::state::GatewayState;
use crate::transport::build_router;

/// Grace period given to the audit worker to drain on shutdown (§5).
const AUDIT_DRAIN_GRACE: Duration = Duration::from_secs(3);

/// Run the Gateway until a shutdown signal arrives.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let (state, audit_worker) = GatewayState::new(config, shutdown.clone())?;
    state.spawn_background_tasks();

    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "gateway listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    // Reverse-order teardown (§9): the listener is already closed above;
    // now drain the audit queue with a bounded grace period. Cleanup
    // tickers and the near-expiry monitor observe the same cancellation
    // and exit on their next tick.
    if tokio::time::timeout(AUDIT_DRAIN_GRACE, audit_worker).await.is_err() {
        error!("audit worker did not drain within the shutdown grace period");
    }

    Ok(())
}
