// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator support calls, gated by accounts stored in the presence registry.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;
use crate::state::ProxyState;
use crate::transport::http::version_text;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupportQuery {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub password: String,
}

/// Built-in support calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportCall {
    Sessions,
    Version,
}

impl SupportCall {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim_matches('/') {
            "sessions" => Some(Self::Sessions),
            "version" => Some(Self::Version),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub server_id: String,
    pub session_count: usize,
}

/// `GET|POST /game/{uuid}/support/{*name}`
pub async fn support_handler(
    State(s): State<Arc<ProxyState>>,
    Path((_uuid, name)): Path<(String, String)>,
    Query(query): Query<SupportQuery>,
) -> Response {
    tracing::info!(call = %name, account = %query.account, "support call");

    match s.presence.verify_support_account(&query.account, &query.password).await {
        Ok(true) => {}
        Ok(false) => {
            return ProxyError::Unauthorized
                .to_http_response(format!("no authorization for support call {name}"));
        }
        Err(e) => {
            tracing::warn!(err = %format!("{e:#}"), "support account lookup failed");
            return ProxyError::UpstreamError.to_http_response("account lookup failed");
        }
    }

    match SupportCall::parse(&name) {
        Some(SupportCall::Sessions) => Json(SessionsResponse {
            server_id: s.config.server_id.clone(),
            session_count: s.sessions.len().await,
        })
        .into_response(),
        Some(SupportCall::Version) => version_text().into_response(),
        None => ProxyError::NotFound.to_http_response(format!("no support handler {name}")),
    }
}

#[cfg(test)]
#[path = "support_tests.rs"]
mod tests;
