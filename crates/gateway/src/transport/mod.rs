// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the Gateway (§4.8).

pub mod auth;
pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::GatewayState;

/// Build the axum `Router` with every Gateway route (§4.8).
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let admin_routes = Router::new()
        .route("/v1/revocations", post(http::create_revocation))
        .layer(middleware::from_fn_with_state(state.clone(), auth::admin_auth_layer));

    Router::new()
        .route("/v1/sessions", post(http::create_session))
        .route("/v1/audit", post(http::ingest_audit))
        .route("/v1/jwks", get(http::jwks))
        .route("/v1/signal", get(ws::signal_handler))
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
