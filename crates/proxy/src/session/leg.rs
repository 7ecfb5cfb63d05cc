// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One side of a session.
//!
//! A leg owns the write half of its connection behind an async mutex, which
//! doubles as the write lock, and moves through `Detached -> Open -> Closing
//! -> Closed`. Closing is a single compare-and-swap, so concurrent closers
//! (read loop exit, sibling cascade, keeper timeout) agree on exactly one
//! winner. The read half is owned by the leg's read loop, which stops when
//! [`Leg::cancelled`] resolves.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Write half that can be shut down when its leg closes.
pub trait LegWriter: Send {
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

impl LegWriter for SplitSink<WebSocket, Message> {
    async fn shutdown(&mut self) {
        // Sends a close frame.
        let _ = SinkExt::close(self).await;
    }
}

impl LegWriter for OwnedWriteHalf {
    async fn shutdown(&mut self) {
        let _ = AsyncWriteExt::shutdown(self).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegState {
    /// No connection attached yet.
    Detached,
    Open,
    Closing,
    Closed,
}

impl LegState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Detached,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Detached => 0,
            Self::Open => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }
}

pub struct Leg<W> {
    state: AtomicU8,
    writer: Mutex<Option<W>>,
    cancel: CancellationToken,
}

impl<W: LegWriter> Leg<W> {
    /// A leg waiting for its connection.
    pub fn detached() -> Self {
        Self {
            state: AtomicU8::new(LegState::Detached.as_u8()),
            writer: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn open(writer: W) -> Self {
        Self {
            state: AtomicU8::new(LegState::Open.as_u8()),
            writer: Mutex::new(Some(writer)),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach the connection to a detached leg.
    ///
    /// Hands the writer back if the leg was closed first.
    pub async fn attach(&self, writer: W) -> Result<(), W> {
        let mut slot = self.writer.lock().await;
        let swapped = self.state.compare_exchange(
            LegState::Detached.as_u8(),
            LegState::Open.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if swapped.is_err() {
            return Err(writer);
        }
        *slot = Some(writer);
        Ok(())
    }

    pub fn state(&self) -> LegState {
        LegState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == LegState::Open
    }

    /// Acquire the write lock. `None` once the leg has closed.
    ///
    /// Must not be held across a call to [`Leg::close`].
    pub async fn writer(&self) -> MutexGuard<'_, Option<W>> {
        self.writer.lock().await
    }

    /// Resolves once the leg starts closing.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Close the leg, shutting its writer down within `deadline`.
    ///
    /// Returns `true` only for the call that performed the close.
    pub async fn close(&self, deadline: Duration) -> bool {
        let claimed = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
            match LegState::from_u8(s) {
                LegState::Detached | LegState::Open => Some(LegState::Closing.as_u8()),
                LegState::Closing | LegState::Closed => None,
            }
        });
        if claimed.is_err() {
            return false;
        }

        self.cancel.cancel();
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            let _ = tokio::time::timeout(deadline, writer.shutdown()).await;
        }
        self.state.store(LegState::Closed.as_u8(), Ordering::Release);
        true
    }
}

#[cfg(test)]
#[path = "leg_tests.rs"]
mod tests;
