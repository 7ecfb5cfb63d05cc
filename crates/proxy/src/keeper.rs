// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background liveness sweeper for all registered sessions.
//!
//! A session whose client has been silent for half the close threshold is
//! pinged (at most once per third of the threshold); past the threshold it
//! is closed.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::JoinHandle;

use crate::registry::SessionRegistry;
use crate::session::{Session, SessionId};
use crate::state::{epoch_ms, ProxyState};
use crate::task::spawn_supervised;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    Healthy,
    /// Quiet, but pinged recently.
    Wait,
    Ping,
    Close,
}

/// Decide what to do with a session given its timestamps (epoch millis).
pub fn liveness_action(
    now_ms: u64,
    last_received_ms: u64,
    last_ping_ms: u64,
    close_after: Duration,
) -> LivenessAction {
    let close_ms = close_after.as_millis() as u64;
    let silent = now_ms.saturating_sub(last_received_ms);

    if silent > close_ms {
        LivenessAction::Close
    } else if silent >= close_ms / 2 {
        if now_ms.saturating_sub(last_ping_ms) >= close_ms / 3 {
            LivenessAction::Ping
        } else {
            LivenessAction::Wait
        }
    } else {
        LivenessAction::Healthy
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub pinged: usize,
    pub closed: usize,
}

/// Run one pass over a snapshot of the registry.
///
/// A panic while handling one session is logged and the pass moves on.
pub async fn sweep_once(
    sessions: &SessionRegistry,
    now_ms: u64,
    close_after: Duration,
) -> SweepReport {
    let entries = sessions.snapshot().await.into_iter().map(|session| (session.id, session));
    sweep_entries(entries, |session| async move {
        check_session(&session, now_ms, close_after).await
    })
    .await
}

async fn sweep_entries<T, F, Fut>(
    entries: impl IntoIterator<Item = (SessionId, Arc<T>)>,
    check: F,
) -> SweepReport
where
    F: Fn(Arc<T>) -> Fut,
    Fut: Future<Output = LivenessAction>,
{
    let mut report = SweepReport::default();

    for (session_id, entry) in entries {
        report.scanned += 1;
        let checked = AssertUnwindSafe(async { check(entry).await }).catch_unwind().await;

        match checked {
            Ok(LivenessAction::Ping) => report.pinged += 1,
            Ok(LivenessAction::Close) => report.closed += 1,
            Ok(_) => {}
            Err(_) => {
                tracing::error!(session_id, "liveness check panicked");
            }
        }
    }

    report
}

async fn check_session(session: &Session, now_ms: u64, close_after: Duration) -> LivenessAction {
    let action = liveness_action(
        now_ms,
        session.last_received_ms(),
        session.last_ping_ms(),
        close_after,
    );

    match action {
        LivenessAction::Close => {
            tracing::info!(
                session_id = session.id,
                target = %session.target,
                silent_ms = now_ms.saturating_sub(session.last_received_ms()),
                "closing silent session"
            );
            session.close_websocket().await;
        }
        LivenessAction::Ping => {
            session.mark_pinged(now_ms);
            if let Err(e) = session.send_ping().await {
                tracing::debug!(session_id = session.id, err = %e, "keepalive ping failed");
            }
        }
        LivenessAction::Healthy | LivenessAction::Wait => {}
    }

    action
}

/// Spawn the periodic sweeper. It stops on process shutdown.
pub fn spawn_keeper(state: Arc<ProxyState>) -> JoinHandle<()> {
    let interval = state.config.keeper_interval();
    let close_after = state.config.close_after();

    spawn_supervised("keeper", async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let report = sweep_once(&state.sessions, epoch_ms(), close_after).await;
            if report.pinged > 0 || report.closed > 0 {
                tracing::debug!(
                    scanned = report.scanned,
                    pinged = report.pinged,
                    closed = report.closed,
                    "liveness sweep"
                );
            }
        }
    })
}

#[cfg(test)]
#[path = "keeper_tests.rs"]
mod tests;
