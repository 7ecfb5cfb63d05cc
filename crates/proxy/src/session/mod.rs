// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session: one client WebSocket paired with one backend TCP connection.
//!
//! Client envelopes with data opcodes are re-framed as backend packets;
//! backend packets are verified, inflated and re-wrapped as envelopes.
//! Control opcodes (ping/pong) are answered locally. Closing either leg
//! closes the other.

pub mod leg;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use crate::codec::envelope::{Op, ProxyMessage, KEEPALIVE_PAYLOAD, OP_PING, OP_PONG};
use crate::codec::packet::{self, Packet};
use crate::state::epoch_ms;
use crate::task::spawn_supervised;

use self::leg::{Leg, LegState};

pub type SessionId = u64;
pub type WsSink = SplitSink<WebSocket, Message>;
pub type WsStream = SplitStream<WebSocket>;

/// Pong payload used when a native ping carries none.
const EMPTY_PONG_PAYLOAD: &[u8] = b"kr";

/// Per-session I/O bounds.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub ws_write_timeout: Duration,
    pub tcp_write_timeout: Duration,
    pub dial_timeout: Duration,
    pub max_payload: usize,
}

pub struct Session {
    pub id: SessionId,
    /// Backend `host:port`, fixed at creation.
    pub target: String,
    /// Browser clients get keepalive pings as envelopes instead of
    /// native ping frames.
    pub web: bool,
    limits: SessionLimits,
    ws: Leg<WsSink>,
    tcp: Leg<OwnedWriteHalf>,
    last_received_ms: AtomicU64,
    last_ping_ms: AtomicU64,
}

impl Session {
    pub fn new(
        id: SessionId,
        ws: WsSink,
        web: bool,
        target: String,
        limits: SessionLimits,
    ) -> Self {
        Self {
            id,
            target,
            web,
            limits,
            ws: Leg::open(ws),
            tcp: Leg::detached(),
            last_received_ms: AtomicU64::new(epoch_ms()),
            last_ping_ms: AtomicU64::new(0),
        }
    }

    /// Dial the backend and start relaying its packets to the client.
    ///
    /// On failure nothing has been spawned and the caller still owns the
    /// WebSocket leg.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        let addr = tokio::net::lookup_host(&self.target)
            .await
            .with_context(|| format!("resolve {}", self.target))?
            .next()
            .ok_or_else(|| anyhow!("no address for {}", self.target))?;

        let stream = tokio::time::timeout(self.limits.dial_timeout, TcpStream::connect(addr))
            .await
            .with_context(|| format!("dial {addr} timed out"))?
            .with_context(|| format!("dial {addr}"))?;
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        if self.tcp.attach(writer).await.is_err() {
            bail!("session closed before backend connected");
        }

        debug!(session_id = self.id, target = %self.target, %addr, "backend connected");
        spawn_supervised("backend-read", Arc::clone(self).serve_tcp(reader));
        Ok(())
    }

    /// Client read loop. Returns once the WebSocket leg is closed, after
    /// cascading the close to the backend.
    pub async fn serve_websocket(&self, mut stream: WsStream) {
        loop {
            let msg = tokio::select! {
                _ = self.ws.cancelled() => break,
                msg = stream.next() => msg,
            };

            let msg = match msg {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    debug!(session_id = self.id, err = %e, "websocket receive error");
                    break;
                }
                None => break,
            };

            self.touch();
            match msg {
                Message::Binary(data) if !data.is_empty() => self.on_websocket_message(&data).await,
                Message::Ping(payload) => {
                    if let Err(e) = self.send_pong(payload).await {
                        debug!(session_id = self.id, err = %e, "pong failed");
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        self.close_websocket().await;
    }

    /// Route one client envelope.
    pub async fn on_websocket_message(&self, frame: &[u8]) {
        let msg = match ProxyMessage::decode_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(session_id = self.id, err = %e, "dropping undecodable envelope");
                return;
            }
        };

        match msg.op() {
            Ok(Op::Data(msg_code)) => {
                let payload = msg.payload();
                let packet = match packet::encode_packet(msg_code, &payload) {
                    Ok(packet) => packet,
                    Err(e) => {
                        debug!(session_id = self.id, msg_code, err = %e, "dropping envelope");
                        return;
                    }
                };
                trace!(session_id = self.id, msg_code, len = payload.len(), "client -> backend");
                if let Err(e) = self.write_tcp(packet).await {
                    warn!(session_id = self.id, msg_code, err = %e, "backend write failed");
                }
            }
            Ok(Op::Ping) => {
                let pong = ProxyMessage::new(OP_PONG, msg.payload());
                if let Err(e) = self.send_envelope(&pong).await {
                    debug!(session_id = self.id, err = %e, "envelope pong failed");
                }
            }
            Ok(Op::Pong) | Ok(Op::Control(_)) => {}
            Err(e) => debug!(session_id = self.id, err = %e, "dropping envelope"),
        }
    }

    /// Forward one backend packet to the client.
    ///
    /// An error is fatal for the backend read loop.
    pub async fn on_tcp_packet(&self, packet: Packet) -> anyhow::Result<()> {
        let msg_code = packet.header.msg_code;
        let payload = packet.into_payload(self.limits.max_payload)?;
        trace!(session_id = self.id, msg_code, len = payload.len(), "backend -> client");
        self.send_envelope(&ProxyMessage::for_msg_code(msg_code, payload)).await
    }

    /// Keepalive ping, as an envelope for browsers and a native frame otherwise.
    pub async fn send_ping(&self) -> anyhow::Result<()> {
        let msg = if self.web {
            Message::Binary(ProxyMessage::new(OP_PING, KEEPALIVE_PAYLOAD).to_bytes())
        } else {
            Message::Ping(Bytes::from_static(KEEPALIVE_PAYLOAD))
        };
        self.write_ws(msg).await
    }

    /// Answer a native ping with the same payload.
    pub async fn send_pong(&self, payload: Bytes) -> anyhow::Result<()> {
        let payload =
            if payload.is_empty() { Bytes::from_static(EMPTY_PONG_PAYLOAD) } else { payload };
        self.write_ws(Message::Pong(payload)).await
    }

    pub async fn send_envelope(&self, msg: &ProxyMessage) -> anyhow::Result<()> {
        self.write_ws(Message::Binary(msg.to_bytes())).await
    }

    /// Close the WebSocket leg and cascade to the backend. Idempotent.
    pub async fn close_websocket(&self) {
        if self.ws.close(self.limits.ws_write_timeout).await {
            debug!(session_id = self.id, "websocket closed");
        }
        if self.tcp.close(self.limits.tcp_write_timeout).await {
            debug!(session_id = self.id, "backend closed by cascade");
        }
    }

    /// Close the backend leg and cascade to the client. Idempotent.
    pub async fn close_tcp(&self) {
        if self.tcp.close(self.limits.tcp_write_timeout).await {
            debug!(session_id = self.id, "backend closed");
        }
        if self.ws.close(self.limits.ws_write_timeout).await {
            debug!(session_id = self.id, "websocket closed by cascade");
        }
    }

    pub fn websocket_state(&self) -> LegState {
        self.ws.state()
    }

    pub fn tcp_state(&self) -> LegState {
        self.tcp.state()
    }

    pub fn last_received_ms(&self) -> u64 {
        self.last_received_ms.load(Ordering::Relaxed)
    }

    pub fn last_ping_ms(&self) -> u64 {
        self.last_ping_ms.load(Ordering::Relaxed)
    }

    pub fn mark_pinged(&self, now_ms: u64) {
        self.last_ping_ms.store(now_ms, Ordering::Relaxed);
    }

    fn touch(&self) {
        self.last_received_ms.store(epoch_ms(), Ordering::Relaxed);
    }

    async fn serve_tcp(self: Arc<Self>, mut reader: OwnedReadHalf) {
        loop {
            let packet = tokio::select! {
                _ = self.tcp.cancelled() => break,
                packet = packet::read_packet(&mut reader, self.limits.max_payload) => packet,
            };

            let result = match packet {
                Ok(packet) => self.on_tcp_packet(packet).await,
                Err(e) if e.is_eof() => {
                    info!(session_id = self.id, target = %self.target, "backend closed connection");
                    break;
                }
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                warn!(
                    session_id = self.id,
                    target = %self.target,
                    err = %format!("{e:#}"),
                    "backend relay stopped"
                );
                break;
            }
        }

        self.close_tcp().await;
    }

    /// Write under the WebSocket write lock. Any failure closes the leg.
    async fn write_ws(&self, msg: Message) -> anyhow::Result<()> {
        let result = {
            let mut writer = self.ws.writer().await;
            let Some(sink) = writer.as_mut() else {
                bail!("websocket closed");
            };
            tokio::time::timeout(self.limits.ws_write_timeout, sink.send(msg)).await
        };

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.close_websocket().await;
                Err(anyhow::Error::new(e).context("websocket write"))
            }
            Err(_) => {
                self.close_websocket().await;
                bail!("websocket write timed out")
            }
        }
    }

    /// Write one packet under the backend write lock.
    ///
    /// A plain I/O error is reported and the packet dropped; the read loop
    /// will observe the broken socket. A timed-out write may have left a
    /// partial packet on the stream, so it closes the leg.
    async fn write_tcp(&self, packet: Bytes) -> anyhow::Result<()> {
        let result = {
            let mut writer = self.tcp.writer().await;
            let Some(conn) = writer.as_mut() else {
                bail!("backend not connected");
            };
            tokio::time::timeout(self.limits.tcp_write_timeout, conn.write_all(&packet)).await
        };

        match result {
            Ok(result) => result.context("backend write"),
            Err(_) => {
                self.close_tcp().await;
                bail!("backend write timed out")
            }
        }
    }
}
