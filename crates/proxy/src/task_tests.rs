// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::spawn_supervised;

#[tokio::test]
async fn completed_task_resolves_watcher() -> anyhow::Result<()> {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    spawn_supervised("complete", async move { flag.store(true, Ordering::SeqCst) }).await?;
    assert!(ran.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
#[allow(clippy::panic)]
async fn panicking_task_is_contained() -> anyhow::Result<()> {
    spawn_supervised("boom", async { panic!("boom") }).await?;

    // The runtime keeps serving other tasks.
    let value = tokio::spawn(async { 7 }).await?;
    assert_eq!(value, 7);
    Ok(())
}
