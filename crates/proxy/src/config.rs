// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

/// WebSocket to TCP gateway for game clients.
#[derive(Debug, Clone, Parser)]
#[command(name = "wsproxy", version, about)]
pub struct ProxyConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "WSPROXY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3001, env = "WSPROXY_PORT")]
    pub port: u16,

    /// Identity of this instance in the presence registry.
    #[arg(long, env = "WSPROXY_SERVER_ID")]
    pub server_id: String,

    /// Redis URL for presence. If unset, presence is disabled.
    #[arg(long, env = "WSPROXY_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Room type recorded in presence keys.
    #[arg(long, default_value_t = 1, env = "WSPROXY_ROOM_TYPE")]
    pub room_type: u32,

    /// `host:port` that HTTP forwarding routes are proxied to.
    #[arg(long, env = "WSPROXY_FORWARD_TARGET")]
    pub forward_target: Option<String>,

    /// Scheme used for forwarded requests.
    #[arg(long, default_value = "http", env = "WSPROXY_FORWARD_SCHEME")]
    pub forward_scheme: String,

    /// Forwarded request timeout in milliseconds.
    #[arg(long, default_value_t = 5000, env = "WSPROXY_FORWARD_TIMEOUT_MS")]
    pub forward_timeout_ms: u64,

    /// Liveness sweep interval in milliseconds.
    #[arg(long, default_value_t = 5000, env = "WSPROXY_KEEPER_INTERVAL_MS")]
    pub keeper_interval_ms: u64,

    /// Seconds of client silence before a session is closed.
    #[arg(long, default_value_t = 90, env = "WSPROXY_CLOSE_AFTER_SECS")]
    pub close_after_secs: u64,

    /// WebSocket write deadline in milliseconds.
    #[arg(long, default_value_t = 5000, env = "WSPROXY_WS_WRITE_TIMEOUT_MS")]
    pub ws_write_timeout_ms: u64,

    /// Backend write deadline in milliseconds.
    #[arg(long, default_value_t = 5000, env = "WSPROXY_TCP_WRITE_TIMEOUT_MS")]
    pub tcp_write_timeout_ms: u64,

    /// Backend dial deadline in milliseconds.
    #[arg(long, default_value_t = 5000, env = "WSPROXY_DIAL_TIMEOUT_MS")]
    pub dial_timeout_ms: u64,

    /// Largest WebSocket message accepted from a client, in bytes.
    #[arg(long, default_value_t = 1024, env = "WSPROXY_WS_READ_LIMIT")]
    pub ws_read_limit: usize,

    /// WebSocket read buffer size in bytes.
    #[arg(long, default_value_t = 2048, env = "WSPROXY_WS_READ_BUFFER")]
    pub ws_read_buffer: usize,

    /// WebSocket write buffer size in bytes.
    #[arg(long, default_value_t = 4096, env = "WSPROXY_WS_WRITE_BUFFER")]
    pub ws_write_buffer: usize,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "WSPROXY_LOG_FORMAT")]
    pub log_format: String,

    /// Log filter, e.g. `info` or `wsproxy=debug`. `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info", env = "WSPROXY_LOG_LEVEL")]
    pub log_level: String,

    /// Largest backend frame payload accepted, in bytes.
    #[arg(long, default_value_t = 16 * 1024 * 1024, env = "WSPROXY_MAX_PAYLOAD_BYTES")]
    pub max_payload_bytes: usize,
}

impl ProxyConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_id.trim().is_empty() {
            anyhow::bail!("--server-id must not be empty");
        }
        if self.close_after_secs == 0 {
            anyhow::bail!("--close-after-secs must be greater than zero");
        }
        if self.keeper_interval_ms == 0 {
            anyhow::bail!("--keeper-interval-ms must be greater than zero");
        }
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("--log-format must be json or text, got {}", self.log_format);
        }
        if self.max_payload_bytes == 0 {
            anyhow::bail!("--max-payload-bytes must be greater than zero");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn keeper_interval(&self) -> Duration {
        Duration::from_millis(self.keeper_interval_ms)
    }

    pub fn close_after(&self) -> Duration {
        Duration::from_secs(self.close_after_secs)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn ws_write_timeout(&self) -> Duration {
        Duration::from_millis(self.ws_write_timeout_ms)
    }

    pub fn tcp_write_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_write_timeout_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
