// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: config and state builders, servers, and a
//! scriptable backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::presence::Presence;
use crate::state::ProxyState;

/// Assert that an expression is `Err` and its message contains a substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

/// Config bound to loopback with presence disabled. Extra CLI flags are
/// appended, so later flags override the defaults here.
pub fn test_config_with(extra: &[&str]) -> ProxyConfig {
    let mut args =
        vec!["wsproxy", "--server-id", "test-proxy", "--host", "127.0.0.1", "--port", "0"];
    args.extend_from_slice(extra);
    ProxyConfig::parse_from(args)
}

pub fn test_config() -> ProxyConfig {
    test_config_with(&[])
}

pub fn test_state(config: ProxyConfig) -> anyhow::Result<Arc<ProxyState>> {
    crate::ensure_crypto_provider();
    let presence = Presence::disabled(&config);
    Ok(Arc::new(ProxyState::new(config, CancellationToken::new(), presence)?))
}

/// Spawn an HTTP server on a random port for integration testing.
///
/// Returns the bound address and a join handle for the server task.
pub async fn spawn_http_server(
    state: Arc<ProxyState>,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let router = crate::transport::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((addr, handle))
}

/// A TCP listener standing in for a game server.
pub struct FakeBackend {
    listener: TcpListener,
    pub addr: SocketAddr,
}

impl FakeBackend {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    /// `host:port` form used as a session target.
    pub fn target(&self) -> String {
        self.addr.to_string()
    }

    pub async fn accept(&self, timeout: Duration) -> anyhow::Result<TcpStream> {
        let (stream, _) = tokio::time::timeout(timeout, self.listener.accept())
            .await
            .map_err(|_| anyhow::anyhow!("backend accept timeout"))??;
        Ok(stream)
    }
}

/// An address nothing is listening on.
pub async fn closed_port() -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}
