// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wsproxy: WebSocket to TCP gateway for game clients.

pub mod codec;
pub mod config;
pub mod error;
pub mod keeper;
pub mod presence;
pub mod registry;
pub mod session;
pub mod state;
pub mod task;
pub mod test_support;
pub mod transport;

use std::sync::{Arc, Once};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::keeper::spawn_keeper;
use crate::presence::Presence;
use crate::state::ProxyState;
use crate::transport::build_router;

/// Protocol version reported to clients and recorded in presence.
pub const VERSION_CODE: u32 = 1;

static CRYPTO_INIT: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Run the proxy until ctrl-c.
pub async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    config.validate()?;
    ensure_crypto_provider();

    let addr = config.listen_addr();
    let shutdown = CancellationToken::new();

    let presence = Presence::connect(&config).await?;
    presence.register_instance(VERSION_CODE).await?;

    let state = Arc::new(ProxyState::new(config, shutdown.clone(), presence)?);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(server_id = %state.config.server_id, "wsproxy listening on {addr}");

    spawn_keeper(Arc::clone(&state));
    spawn_signal_handler(Arc::clone(&state));

    let router = build_router(Arc::clone(&state));
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    tracing::info!("wsproxy stopped");
    Ok(())
}

/// Cancel the shutdown token on ctrl-c and close live sessions.
fn spawn_signal_handler(state: Arc<ProxyState>) {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!(err = %e, "failed to listen for ctrl-c");
                    return;
                }
                tracing::info!("shutdown requested");
            }
            _ = state.shutdown.cancelled() => {}
        }
        state.shutdown.cancel();
        state.close_all_sessions().await;
    });
}
