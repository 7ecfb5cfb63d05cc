// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{liveness_action, sweep_entries, sweep_once, LivenessAction};
use crate::registry::SessionRegistry;

const NOW: u64 = 10_000_000;
const CLOSE_AFTER: Duration = Duration::from_secs(90);

fn ms_ago(ms: u64) -> u64 {
    NOW - ms
}

#[yare::parameterized(
    just_heard        = { ms_ago(0),       0,              LivenessAction::Healthy },
    under_half        = { ms_ago(44_900),  0,              LivenessAction::Healthy },
    half_never_pinged = { ms_ago(45_000),  0,              LivenessAction::Ping },
    pinged_recently   = { ms_ago(60_000),  ms_ago(10_000), LivenessAction::Wait },
    ping_due_again    = { ms_ago(60_000),  ms_ago(30_000), LivenessAction::Ping },
    at_threshold      = { ms_ago(90_000),  ms_ago(29_000), LivenessAction::Wait },
    past_threshold    = { ms_ago(90_001),  ms_ago(1_000),  LivenessAction::Close },
    long_gone         = { ms_ago(600_000), 0,              LivenessAction::Close },
    clock_went_back   = { NOW + 5_000,     0,              LivenessAction::Healthy },
)]
fn liveness_bands(last_received: u64, last_ping: u64, expected: LivenessAction) {
    assert_eq!(liveness_action(NOW, last_received, last_ping, CLOSE_AFTER), expected);
}

#[test]
fn bands_scale_with_threshold() {
    let close_after = Duration::from_secs(9);
    assert_eq!(liveness_action(NOW, NOW - 4_000, 0, close_after), LivenessAction::Healthy);
    assert_eq!(liveness_action(NOW, NOW - 4_500, 0, close_after), LivenessAction::Ping);
    assert_eq!(liveness_action(NOW, NOW - 4_500, NOW - 2_000, close_after), LivenessAction::Wait);
    assert_eq!(liveness_action(NOW, NOW - 9_001, NOW, close_after), LivenessAction::Close);
}

#[tokio::test]
async fn empty_registry_sweeps_nothing() {
    let sessions = SessionRegistry::new();
    let report = sweep_once(&sessions, NOW, CLOSE_AFTER).await;
    assert_eq!(report.scanned, 0);
    assert_eq!(report.pinged, 0);
    assert_eq!(report.closed, 0);
}

#[tokio::test]
#[allow(clippy::panic)]
async fn panicking_check_does_not_stop_the_pass() {
    let checked = AtomicUsize::new(0);
    let entries = vec![(1, Arc::new(true)), (2, Arc::new(false)), (3, Arc::new(false))];

    let report = sweep_entries(entries, |explodes| {
        let checked = &checked;
        async move {
            if *explodes {
                panic!("check failed");
            }
            checked.fetch_add(1, Ordering::SeqCst);
            LivenessAction::Close
        }
    })
    .await;

    assert_eq!(report.scanned, 3);
    assert_eq!(report.closed, 2);
    assert_eq!(checked.load(Ordering::SeqCst), 2);
}
