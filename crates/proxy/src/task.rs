// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;

use tokio::task::JoinHandle;

/// Spawn a background task whose panic is logged instead of lost.
///
/// The returned handle resolves once the task has finished, whether it
/// completed, panicked or was aborted.
pub fn spawn_supervised<F>(name: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let inner = tokio::spawn(future);
    tokio::spawn(async move {
        match inner.await {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                tracing::error!(task = name, "background task panicked: {e}");
            }
            Err(e) => {
                tracing::debug!(task = name, "background task cancelled: {e}");
            }
        }
    })
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
