// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Refresh scheduler tests.
//!
//! These tests verify that:
//! 1. A stale cache triggers exactly one batch run per tick
//! 2. Fresh caches, empty directories and busy locks are no-ops
//! 3. A directory failure or a run where every member fails keeps the
//!    previous cache entry
//! 4. start/stop are idempotent and nothing fires after stop

use chrono::Utc;
use community_feed::config::Config;
use community_feed::db::{CacheStore, MemoryStore};
use community_feed::models::ActivityCacheEntry;
use community_feed::services::{Purpose, RefreshReport, SchedulerState, TickOutcome};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{build_state, create_test_app, event, members, test_db_offline, Script, ScriptedSource};

fn stale_entry(minutes_old: i64) -> ActivityCacheEntry {
    ActivityCacheEntry::new(
        vec![event("old", minutes_old, 0)],
        Utc::now() - chrono::Duration::minutes(minutes_old),
    )
}

#[tokio::test]
async fn test_stale_cache_is_refreshed_once() {
    let roster = members(3);
    let app = create_test_app(roster.clone(), ScriptedSource::with_events(&roster, 1));
    app.store.put_feed(&stale_entry(90)).await.unwrap();

    let outcome = app.state.scheduler.tick().await;

    assert_eq!(outcome, TickOutcome::Refreshed);
    assert_eq!(app.source.calls(), 3, "one batch run: each member once");
    let entry = app.store.get_feed().await.unwrap().unwrap();
    assert_eq!(entry.events.len(), 3);
    assert_eq!(app.state.scheduler.state(), SchedulerState::Idle);

    // Now fresh: the next tick does nothing
    assert_eq!(app.state.scheduler.tick().await, TickOutcome::Fresh);
    assert_eq!(app.source.calls(), 3);
}

#[tokio::test]
async fn test_cold_cache_is_refreshed() {
    let roster = members(2);
    let app = create_test_app(roster.clone(), ScriptedSource::with_events(&roster, 2));

    assert_eq!(app.state.scheduler.tick().await, TickOutcome::Refreshed);
    assert!(app.store.get_feed().await.unwrap().is_some());
}

#[tokio::test]
async fn test_empty_directory_is_noop() {
    let app = create_test_app(Vec::new(), ScriptedSource::new());

    assert_eq!(app.state.scheduler.tick().await, TickOutcome::EmptyDirectory);
    assert!(app.store.get_feed().await.unwrap().is_none());
    assert_eq!(app.source.calls(), 0);
}

#[tokio::test]
async fn test_directory_failure_keeps_previous_entry() {
    let store = Arc::new(MemoryStore::new());
    let previous = stale_entry(120);
    store.put_feed(&previous).await.unwrap();

    let state = build_state(
        Config::test_default(),
        Arc::new(test_db_offline()),
        store.clone(),
        Arc::new(ScriptedSource::new()),
    );

    assert_eq!(state.scheduler.tick().await, TickOutcome::Failed);
    assert_eq!(store.get_feed().await.unwrap(), Some(previous));
}

#[tokio::test]
async fn test_all_members_failing_keeps_previous_entry() {
    let roster = members(3);
    let source = ScriptedSource::new();
    for member in &roster {
        source.script(&member.id, Script::Fail);
    }
    let app = create_test_app(roster, source);
    let previous = stale_entry(90);
    app.store.put_feed(&previous).await.unwrap();

    assert_eq!(app.state.scheduler.tick().await, TickOutcome::Failed);
    assert_eq!(app.store.get_feed().await.unwrap(), Some(previous.clone()));

    // Still stale, so the next tick tries again
    assert_eq!(app.state.scheduler.tick().await, TickOutcome::Failed);
    assert_eq!(app.source.calls(), 6);
    assert_eq!(app.store.get_feed().await.unwrap(), Some(previous));
}

#[tokio::test]
async fn test_partial_failure_is_cached() {
    let roster = members(3);
    let source = ScriptedSource::with_events(&roster, 2);
    source.script("m1", Script::Fail);
    let app = create_test_app(roster, source);

    let report = app.state.scheduler.force_refresh().await.unwrap();
    assert_eq!(
        report,
        RefreshReport::Refreshed {
            events: 4,
            attempted: 3,
            failed: 1
        }
    );
    assert_eq!(app.store.get_feed().await.unwrap().unwrap().events.len(), 4);
}

#[tokio::test]
async fn test_state_tracks_refresh_from_any_caller() {
    let roster = members(1);
    let source = ScriptedSource::new();
    source.script(
        "m0",
        Script::Slow(Duration::from_millis(300), vec![event("m0", 1, 0)]),
    );
    let app = create_test_app(roster, source);
    assert_eq!(app.state.scheduler.state(), SchedulerState::Idle);

    let scheduler = app.state.scheduler.clone();
    let forced = tokio::spawn(async move { scheduler.force_refresh().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.state.scheduler.state(), SchedulerState::Refreshing);

    // A skipped tick leaves the running refresh visible
    assert_eq!(app.state.scheduler.tick().await, TickOutcome::Busy);
    assert_eq!(app.state.scheduler.state(), SchedulerState::Refreshing);

    forced.await.unwrap().unwrap();
    assert_eq!(app.state.scheduler.state(), SchedulerState::Idle);
}

#[tokio::test]
async fn test_tick_skips_while_refresh_in_progress() {
    let roster = members(1);
    let source = ScriptedSource::new();
    source.script(
        "m0",
        Script::Slow(Duration::from_millis(300), vec![event("m0", 1, 0)]),
    );
    let app = create_test_app(roster, source);

    let feed = app.state.feed.clone();
    let running = tokio::spawn(async move { feed.refresh().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(app.state.scheduler.tick().await, TickOutcome::Busy);

    let report = running.await.unwrap().unwrap();
    assert!(matches!(report, RefreshReport::Refreshed { events: 1, .. }));
    assert_eq!(app.source.calls(), 1);
}

#[tokio::test]
async fn test_force_refresh_ignores_age() {
    let roster = members(2);
    let app = create_test_app(roster.clone(), ScriptedSource::with_events(&roster, 1));

    assert_eq!(app.state.scheduler.tick().await, TickOutcome::Refreshed);
    assert_eq!(app.state.scheduler.tick().await, TickOutcome::Fresh);

    let report = app.state.scheduler.force_refresh().await.unwrap();
    assert_eq!(
        report,
        RefreshReport::Refreshed {
            events: 2,
            attempted: 2,
            failed: 0
        }
    );
    assert_eq!(app.source.calls(), 4);
}

#[tokio::test]
async fn test_tick_resets_credential_counters() {
    let app = create_test_app(Vec::new(), ScriptedSource::new());
    let pool = app.state.pool.clone();

    pool.record_call(pool.select_for_purpose(Purpose::Bulk), 3);
    assert_eq!(pool.usage().iter().map(|u| u.calls).sum::<u64>(), 3);

    app.state.scheduler.tick().await;
    assert!(pool.usage().iter().all(|u| u.calls == 0));
}

#[tokio::test]
async fn test_start_stop_idempotent_and_final() {
    let roster = members(1);
    let source = Arc::new(ScriptedSource::with_events(&roster, 1));

    let mut config = Config::test_default();
    config.refresh_interval = Duration::from_millis(40);
    config.freshness_threshold = Duration::ZERO;

    let store = Arc::new(MemoryStore::with_members(roster));
    let state = build_state(config, store.clone(), store, source.clone());
    let scheduler = state.scheduler.clone();

    assert!(scheduler.start());
    assert!(!scheduler.start(), "second start is a no-op");
    assert!(scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(scheduler.stop().await);
    assert!(!scheduler.stop().await, "second stop is a no-op");
    assert!(!scheduler.is_running());

    let calls_at_stop = source.calls();
    assert!(calls_at_stop >= 2, "timer should have fired, got {}", calls_at_stop);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(source.calls(), calls_at_stop, "no refresh after stop");
}
