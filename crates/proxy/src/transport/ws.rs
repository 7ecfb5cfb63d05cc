// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client WebSocket entry point.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde::Deserialize;

use crate::error::ProxyError;
use crate::session::Session;
use crate::state::ProxyState;

/// Connection kind that pairs the client with a backend.
const PLAY: &str = "play";

/// Query parameters for the WebSocket upgrade.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayQuery {
    /// `1` for browser clients.
    pub web: Option<String>,
    /// Backend `host:port`.
    pub target: Option<String>,
}

impl PlayQuery {
    pub fn is_web(&self) -> bool {
        self.web.as_deref() == Some("1")
    }
}

/// `GET /game/{uuid}/ws/{wtype}`: WebSocket upgrade.
pub async fn ws_handler(
    State(state): State<Arc<ProxyState>>,
    Path((uuid, wtype)): Path<(String, String)>,
    Query(query): Query<PlayQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let config = &state.config;
    let ws = ws
        .max_message_size(config.ws_read_limit)
        .max_frame_size(config.ws_read_limit)
        .read_buffer_size(config.ws_read_buffer)
        .write_buffer_size(config.ws_write_buffer);

    if wtype != PLAY {
        tracing::debug!(%uuid, %wtype, "closing unsupported websocket kind");
        return ws.on_upgrade(close_immediately).into_response();
    }

    let Some(target) = query.target.clone().filter(|t| !t.is_empty()) else {
        return ProxyError::BadRequest.to_http_response("missing target");
    };
    let web = query.is_web();

    ws.on_upgrade(move |socket| handle_play(state, socket, web, target)).into_response()
}

async fn close_immediately(mut socket: WebSocket) {
    let _ = socket.send(Message::Close(None)).await;
}

/// Pair the client with its backend and serve until either side closes.
async fn handle_play(state: Arc<ProxyState>, socket: WebSocket, web: bool, target: String) {
    let (sink, stream) = socket.split();
    let id = state.sessions.next_id();
    let session = Arc::new(Session::new(id, sink, web, target, state.session_limits()));

    if let Err(e) = session.start().await {
        tracing::warn!(
            session_id = id,
            target = %session.target,
            err = %format!("{e:#}"),
            "backend unavailable"
        );
        session.close_websocket().await;
        return;
    }

    tracing::info!(session_id = id, target = %session.target, web, "session started");
    state.sessions.insert(id, Arc::clone(&session)).await;
    state.presence.incr_online().await;

    session.serve_websocket(stream).await;

    state.sessions.remove(id).await;
    state.presence.decr_online().await;
    tracing::info!(session_id = id, target = %session.target, "session ended");
}
