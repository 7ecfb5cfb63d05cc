// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance registration and online counters in Redis.
//!
//! Keys:
//! - `proxyserver:<server_id>`: hash of `roomtype`, `ver`, `p` (port)
//! - `proxyserver:<room_type>`: set of server ids for the room type
//! - `wsproxy:<room_type>`: hash of server id to live session count
//! - `xhproxy<room_type>`: hash of support account to password

use std::collections::HashMap;

use anyhow::Context;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{info, warn};

use crate::config::ProxyConfig;

const INSTANCE_PREFIX: &str = "proxyserver:";
const ONLINE_PREFIX: &str = "wsproxy:";
const SUPPORT_ACCOUNTS_PREFIX: &str = "xhproxy";

pub fn instance_key(server_id: &str) -> String {
    format!("{INSTANCE_PREFIX}{server_id}")
}

pub fn room_set_key(room_type: u32) -> String {
    format!("{INSTANCE_PREFIX}{room_type}")
}

pub fn online_key(room_type: u32) -> String {
    format!("{ONLINE_PREFIX}{room_type}")
}

pub fn support_accounts_key(room_type: u32) -> String {
    format!("{SUPPORT_ACCOUNTS_PREFIX}{room_type}")
}

/// Presence registrar. Without a Redis connection every operation is a
/// no-op and support accounts are rejected.
#[derive(Clone)]
pub struct Presence {
    redis: Option<ConnectionManager>,
    server_id: String,
    room_type: u32,
    port: u16,
}

impl Presence {
    pub fn disabled(config: &ProxyConfig) -> Self {
        Self {
            redis: None,
            server_id: config.server_id.clone(),
            room_type: config.room_type,
            port: config.port,
        }
    }

    /// Connect when a Redis URL is configured.
    pub async fn connect(config: &ProxyConfig) -> anyhow::Result<Self> {
        let mut presence = Self::disabled(config);
        if let Some(ref url) = config.redis_url {
            let client = Client::open(url.as_str()).context("invalid redis url")?;
            let manager = ConnectionManager::new(client).await.context("connect to redis")?;
            presence.redis = Some(manager);
        }
        Ok(presence)
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }

    /// Record this instance. Fails if another live instance already uses
    /// the same server id.
    pub async fn register_instance(&self, version: u32) -> anyhow::Result<()> {
        let Some(mut conn) = self.redis.clone() else {
            info!(server_id = %self.server_id, "presence disabled, skipping registration");
            return Ok(());
        };

        if self.identity_taken(&mut conn).await {
            anyhow::bail!("an instance with server id {} is already running", self.server_id);
        }

        redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(instance_key(&self.server_id))
            .arg("roomtype")
            .arg(self.room_type)
            .arg("ver")
            .arg(version)
            .arg("p")
            .arg(self.port)
            .ignore()
            .cmd("SADD")
            .arg(room_set_key(self.room_type))
            .arg(&self.server_id)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .context("register instance")?;

        info!(server_id = %self.server_id, room_type = self.room_type, "instance registered");
        Ok(())
    }

    pub async fn incr_online(&self) {
        self.adjust_online(1).await;
    }

    pub async fn decr_online(&self) {
        self.adjust_online(-1).await;
    }

    /// Check a support account's password against the registry.
    pub async fn verify_support_account(
        &self,
        account: &str,
        password: &str,
    ) -> anyhow::Result<bool> {
        let Some(mut conn) = self.redis.clone() else {
            return Ok(false);
        };
        if account.is_empty() {
            return Ok(false);
        }

        let stored: Option<String> = conn
            .hget(support_accounts_key(self.room_type), account)
            .await
            .context("lookup support account")?;
        Ok(stored.is_some_and(|stored| constant_time_eq(&stored, password)))
    }

    /// Subscribers on a channel named after our id mean a live instance holds it.
    async fn identity_taken(&self, conn: &mut ConnectionManager) -> bool {
        let counts: HashMap<String, i64> = match redis::cmd("PUBSUB")
            .arg("NUMSUB")
            .arg(&self.server_id)
            .query_async(conn)
            .await
        {
            Ok(counts) => counts,
            Err(e) => {
                warn!(server_id = %self.server_id, err = %e, "identity check failed");
                return false;
            }
        };
        counts.get(&self.server_id).copied().unwrap_or(0) > 0
    }

    async fn adjust_online(&self, delta: i64) {
        let Some(mut conn) = self.redis.clone() else {
            return;
        };
        let result: redis::RedisResult<i64> =
            conn.hincr(online_key(self.room_type), &self.server_id, delta).await;
        if let Err(e) = result {
            warn!(server_id = %self.server_id, delta, err = %e, "online counter update failed");
        }
    }
}

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

#[cfg(test)]
#[path = "presence_tests.rs"]
mod tests;
