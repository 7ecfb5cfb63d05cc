// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reverse HTTP forwarding to a fixed upstream.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName};
use axum::response::{IntoResponse, Response};
use reqwest::Client;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::state::ProxyState;

/// Largest request body buffered for forwarding.
const MAX_FORWARD_BODY: usize = 4 * 1024 * 1024;

/// Headers that describe a single hop and are not forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Copy end-to-end headers only.
pub fn end_to_end_headers(src: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(src.len());
    for (name, value) in src {
        if !is_hop_by_hop(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

pub struct Forwarder {
    client: Client,
    /// `scheme://host:port`, or `None` when forwarding is not configured.
    base_url: Option<String>,
}

impl Forwarder {
    pub fn new(config: &ProxyConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.forward_timeout()).build()?;
        let base_url = config
            .forward_target
            .as_ref()
            .map(|target| format!("{}://{}", config.forward_scheme, target));
        Ok(Self { client, base_url })
    }

    /// Replay `req` against the upstream and relay its answer.
    pub async fn forward(&self, req: Request) -> Response {
        let Some(ref base_url) = self.base_url else {
            return ProxyError::UpstreamError.to_http_response("no forward target configured");
        };

        let (parts, body) = req.into_parts();
        let path = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let url = format!("{base_url}{path}");

        let body = match axum::body::to_bytes(body, MAX_FORWARD_BODY).await {
            Ok(body) => body,
            Err(e) => return ProxyError::BadRequest.to_http_response(e.to_string()),
        };

        tracing::debug!(method = %parts.method, %url, len = body.len(), "forwarding request");
        let result = self
            .client
            .request(parts.method.clone(), &url)
            .headers(end_to_end_headers(&parts.headers))
            .body(body)
            .send()
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(%url, err = %e, "forward failed");
                return ProxyError::UpstreamError.to_http_response(e.to_string());
            }
        };

        let status = resp.status();
        let headers = end_to_end_headers(resp.headers());
        match resp.bytes().await {
            Ok(bytes) => (status, headers, Body::from(bytes)).into_response(),
            Err(e) => {
                tracing::warn!(%url, err = %e, "forward response failed");
                ProxyError::UpstreamError.to_http_response(e.to_string())
            }
        }
    }
}

/// `POST /t9user/Login` and other forwarded routes.
pub async fn forward_handler(State(s): State<Arc<ProxyState>>, req: Request) -> Response {
    s.forwarder.forward(req).await
}

#[cfg(test)]
#[path = "forward_tests.rs"]
mod tests;
