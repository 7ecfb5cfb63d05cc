// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain HTTP handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::ProxyState;
use crate::VERSION_CODE;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub session_count: usize,
}

/// `GET /health`
pub async fn health(State(s): State<Arc<ProxyState>>) -> impl IntoResponse {
    Json(HealthResponse { status: "running".to_owned(), session_count: s.sessions.len().await })
}

pub fn version_text() -> String {
    format!("version:{VERSION_CODE}")
}

/// `GET /game/{uuid}/version`: protocol version probe.
pub async fn version(Path(_uuid): Path<String>) -> impl IntoResponse {
    version_text()
}
