// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the proxy.

pub mod forward;
pub mod http;
pub mod support;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::ProxyState;

/// Build the axum `Router` with all proxy routes.
pub fn build_router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/health", get(http::health))
        // Game clients
        .route("/game/{uuid}/ws/{wtype}", get(ws::ws_handler))
        .route("/game/{uuid}/version", get(http::version))
        // Operator support
        .route(
            "/game/{uuid}/support/{*name}",
            get(support::support_handler).post(support::support_handler),
        )
        // Forwarded to the account service
        .route("/t9user/Login", post(forward::forward_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
