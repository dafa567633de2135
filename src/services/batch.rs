// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Batched, failure-isolated fetching of the whole member list.
//!
//! Members are split into `ceil(members / pool size)` contiguous batches,
//! each batch gets the next purpose in the cycle, and every member of every
//! batch is fetched concurrently. A failed or timed-out member contributes
//! nothing; the run always completes.

use crate::models::activity::sort_newest_first;
use crate::models::{ActivityEvent, Member};
use crate::services::credentials::Purpose;
use crate::services::fetcher::ActivitySource;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// One contiguous slice of members sharing a purpose.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub purpose: Purpose,
    pub members: Vec<Member>,
}

/// Partition members into batches sized by the credential pool.
pub fn plan_batches(members: Vec<Member>, pool_size: usize) -> Vec<Batch> {
    if members.is_empty() {
        return Vec::new();
    }

    let pool_size = pool_size.max(1);
    let batch_count = members.len().div_ceil(pool_size);
    let batch_len = members.len().div_ceil(batch_count);

    let mut batches = Vec::with_capacity(batch_count);
    let mut remaining = members.into_iter().peekable();
    let mut index = 0;
    while remaining.peek().is_some() {
        let chunk: Vec<Member> = remaining.by_ref().take(batch_len).collect();
        batches.push(Batch {
            index,
            purpose: Purpose::cyclic(index),
            members: chunk,
        });
        index += 1;
    }
    batches
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Merged events, newest first
    pub events: Vec<ActivityEvent>,
    /// Members attempted (each exactly once)
    pub attempted: u32,
    /// Members whose fetch failed or timed out
    pub failed: u32,
    pub failed_member_ids: Vec<String>,
}

impl BatchResult {
    /// Returns true if every member was fetched successfully.
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }

    /// Returns true if some members failed and some succeeded.
    pub fn is_partial_failure(&self) -> bool {
        self.failed > 0 && self.failed < self.attempted
    }

    /// Returns true if members were attempted and every one of them failed.
    pub fn is_total_failure(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

/// Per-member outcome inside a batch.
enum MemberOutcome {
    Fetched(Vec<ActivityEvent>),
    Failed(String),
}

/// Runs the batch plan against an activity source.
#[derive(Clone)]
pub struct BatchFetcher {
    source: Arc<dyn ActivitySource>,
    pool_size: usize,
    member_timeout: Duration,
}

impl BatchFetcher {
    pub fn new(source: Arc<dyn ActivitySource>, pool_size: usize, member_timeout: Duration) -> Self {
        Self {
            source,
            pool_size,
            member_timeout,
        }
    }

    /// Fetch all fetchable members and merge their events.
    pub async fn fetch_all(&self, members: Vec<Member>) -> BatchResult {
        let eligible: Vec<Member> = members.into_iter().filter(Member::is_fetchable).collect();
        let attempted = eligible.len() as u32;
        let batches = plan_batches(eligible, self.pool_size);

        tracing::info!(
            members = attempted,
            batches = batches.len(),
            "Starting batch fetch"
        );

        let batch_outcomes = join_all(batches.iter().map(|batch| self.run_batch(batch))).await;

        let mut result = BatchResult {
            attempted,
            ..Default::default()
        };
        for outcome in batch_outcomes.into_iter().flatten() {
            match outcome {
                MemberOutcome::Fetched(events) => result.events.extend(events),
                MemberOutcome::Failed(member_id) => {
                    result.failed += 1;
                    result.failed_member_ids.push(member_id);
                }
            }
        }

        // Completion order is arbitrary; the output order is not.
        sort_newest_first(&mut result.events);

        if result.is_complete_success() {
            tracing::info!(
                members = result.attempted,
                events = result.events.len(),
                "Batch fetch complete"
            );
        } else {
            tracing::warn!(
                members = result.attempted,
                failed = result.failed,
                failed_member_ids = ?result.failed_member_ids,
                events = result.events.len(),
                "Batch fetch complete with failures"
            );
        }

        result
    }

    async fn run_batch(&self, batch: &Batch) -> Vec<MemberOutcome> {
        tracing::debug!(
            batch = batch.index,
            purpose = %batch.purpose,
            members = batch.members.len(),
            "Running batch"
        );

        join_all(
            batch
                .members
                .iter()
                .map(|member| self.fetch_member(member, batch.purpose)),
        )
        .await
    }

    async fn fetch_member(&self, member: &Member, purpose: Purpose) -> MemberOutcome {
        let fetch = self.source.fetch_member_activity(member, purpose);
        match tokio::time::timeout(self.member_timeout, fetch).await {
            Ok(Ok(events)) => MemberOutcome::Fetched(events),
            Ok(Err(e)) => {
                tracing::warn!(
                    member_id = %member.id,
                    purpose = %purpose,
                    error = %e,
                    "Member fetch failed, skipping"
                );
                MemberOutcome::Failed(member.id.clone())
            }
            Err(_) => {
                tracing::warn!(
                    member_id = %member.id,
                    purpose = %purpose,
                    timeout_secs = self.member_timeout.as_secs(),
                    "Member fetch timed out, skipping"
                );
                MemberOutcome::Failed(member.id.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(n: usize) -> Vec<Member> {
        (0..n)
            .map(|i| Member {
                id: format!("m{}", i),
                display_name: format!("Member {}", i),
                external_username: Some(format!("user{}", i)),
                avatar_url: None,
            })
            .collect()
    }

    #[test]
    fn test_plan_batches_counts() {
        assert_eq!(plan_batches(members(5), 2).len(), 3);
        assert_eq!(plan_batches(members(4), 2).len(), 2);
        assert_eq!(plan_batches(members(1), 4).len(), 1);
        assert_eq!(plan_batches(members(7), 1).len(), 7);
        assert!(plan_batches(Vec::new(), 3).is_empty());
    }

    #[test]
    fn test_plan_batches_are_contiguous_and_complete() {
        let batches = plan_batches(members(5), 2);
        let ids: Vec<String> = batches
            .iter()
            .flat_map(|b| b.members.iter().map(|m| m.id.clone()))
            .collect();
        assert_eq!(ids, vec!["m0", "m1", "m2", "m3", "m4"]);
        assert!(batches.iter().all(|b| !b.members.is_empty()));
    }

    #[test]
    fn test_plan_batches_cycle_purposes() {
        let batches = plan_batches(members(10), 2);
        assert_eq!(batches.len(), 5);
        for pair in batches.windows(2) {
            assert_ne!(pair[0].purpose, pair[1].purpose);
        }
        assert_eq!(batches[0].purpose, Purpose::Primary);
        assert_eq!(batches[4].purpose, Purpose::Primary);
    }

    #[test]
    fn test_batch_result_flags() {
        let partial = BatchResult {
            attempted: 3,
            failed: 1,
            ..Default::default()
        };
        assert!(partial.is_partial_failure());
        assert!(!partial.is_complete_success());
        assert!(!partial.is_total_failure());
        assert!(BatchResult::default().is_complete_success());
        assert!(!BatchResult::default().is_total_failure());

        let total = BatchResult {
            attempted: 2,
            failed: 2,
            ..Default::default()
        };
        assert!(total.is_total_failure());
        assert!(!total.is_partial_failure());
    }
}
