// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Batch fetcher tests.
//!
//! These tests verify that:
//! 1. Members are split into pool-sized batches with cycling purposes
//! 2. One failing or hanging member never aborts the run
//! 3. The merged output is always newest first

use community_feed::models::Member;
use community_feed::services::{BatchFetcher, Purpose};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{event, members, Script, ScriptedSource};

fn batch_fetcher(source: Arc<ScriptedSource>, pool_size: usize) -> BatchFetcher {
    BatchFetcher::new(source, pool_size, Duration::from_secs(5))
}

#[tokio::test]
async fn test_five_members_two_credentials_three_batches() {
    let roster = members(5);
    let source = Arc::new(ScriptedSource::with_events(&roster, 1));

    let result = batch_fetcher(source.clone(), 2).fetch_all(roster).await;

    assert_eq!(result.attempted, 5);
    assert_eq!(source.calls(), 5, "each member fetched exactly once");

    let purposes: Vec<Purpose> = ["m0", "m2", "m4"]
        .iter()
        .map(|id| source.purpose_of(id).unwrap())
        .collect();
    assert_ne!(purposes[0], purposes[1]);
    assert_ne!(purposes[1], purposes[2]);

    // Members of one batch share a purpose
    assert_eq!(source.purpose_of("m0"), source.purpose_of("m1"));
    assert_eq!(source.purpose_of("m2"), source.purpose_of("m3"));
}

#[tokio::test]
async fn test_failed_member_contributes_nothing() {
    let roster = members(4);
    let source = ScriptedSource::with_events(&roster, 3);
    source.script("m2", Script::Fail);
    let source = Arc::new(source);

    let result = batch_fetcher(source.clone(), 2).fetch_all(roster).await;

    assert_eq!(result.events.len(), 9);
    assert_eq!(result.failed, 1);
    assert_eq!(result.failed_member_ids, vec!["m2".to_string()]);
    assert!(result.is_partial_failure());
    assert!(result.events.iter().all(|e| e.repository != "community/m2"));
    assert_eq!(source.calls(), 4);
}

#[tokio::test]
async fn test_hanging_member_times_out() {
    let roster = members(3);
    let source = ScriptedSource::with_events(&roster, 2);
    source.script(
        "m1",
        Script::Slow(Duration::from_secs(10), vec![event("m1", 1, 0)]),
    );
    let source = Arc::new(source);

    let fetcher = BatchFetcher::new(source, 3, Duration::from_millis(100));
    let started = std::time::Instant::now();
    let result = fetcher.fetch_all(roster).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.failed, 1);
    assert_eq!(result.events.len(), 4);
}

#[tokio::test]
async fn test_output_is_sorted_regardless_of_completion_order() {
    let roster = members(6);
    let source = ScriptedSource::new();
    for (i, member) in roster.iter().enumerate() {
        // Interleave timestamps across members and finish in reverse order
        let events = vec![event(&member.id, i as i64, 0), event(&member.id, 30 - i as i64, 1)];
        let delay = Duration::from_millis(10 * (6 - i as u64));
        source.script(&member.id, Script::Slow(delay, events));
    }

    let result = batch_fetcher(Arc::new(source), 4)
        .fetch_all(roster)
        .await;

    assert_eq!(result.events.len(), 12);
    for pair in result.events.windows(2) {
        assert!(pair[0].occurred_at >= pair[1].occurred_at);
    }
}

#[tokio::test]
async fn test_members_without_username_are_skipped() {
    let mut roster = members(2);
    roster.push(Member {
        id: "anon".to_string(),
        display_name: "Anonymous".to_string(),
        external_username: None,
        avatar_url: None,
    });
    let source = Arc::new(ScriptedSource::with_events(&roster, 1));

    let result = batch_fetcher(source.clone(), 2).fetch_all(roster).await;

    assert_eq!(result.attempted, 2);
    assert_eq!(source.calls(), 2);
    assert!(source.purpose_of("anon").is_none());
}

#[tokio::test]
async fn test_empty_roster() {
    let source = Arc::new(ScriptedSource::new());
    let result = batch_fetcher(source.clone(), 2).fetch_all(Vec::new()).await;

    assert!(result.events.is_empty());
    assert_eq!(result.attempted, 0);
    assert_eq!(source.calls(), 0);
}
