// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::presence::Presence;
use crate::registry::SessionRegistry;
use crate::session::SessionLimits;
use crate::transport::forward::Forwarder;

/// Shared proxy state.
pub struct ProxyState {
    pub config: ProxyConfig,
    pub shutdown: CancellationToken,
    pub sessions: SessionRegistry,
    pub presence: Presence,
    pub forwarder: Forwarder,
}

impl ProxyState {
    pub fn new(
        config: ProxyConfig,
        shutdown: CancellationToken,
        presence: Presence,
    ) -> anyhow::Result<Self> {
        let forwarder = Forwarder::new(&config)?;
        Ok(Self { config, shutdown, sessions: SessionRegistry::new(), presence, forwarder })
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            ws_write_timeout: self.config.ws_write_timeout(),
            tcp_write_timeout: self.config.tcp_write_timeout(),
            dial_timeout: self.config.dial_timeout(),
            max_payload: self.config.max_payload_bytes,
        }
    }

    /// Close every live session, e.g. on shutdown.
    pub async fn close_all_sessions(&self) {
        for session in self.sessions.snapshot().await {
            session.close_websocket().await;
        }
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
