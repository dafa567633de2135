// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-member activity fetching.
//!
//! Turns one member's public GitHub event feed into a newest-first list of
//! feed events limited to the trailing window. An unknown user is not an
//! error and yields an empty list.

use crate::error::AppError;
use crate::models::activity::sort_newest_first;
use crate::models::{ActivityEvent, Member};
use crate::services::credentials::Purpose;
use crate::services::github::{GitHubClient, RawEvent};
use crate::services::normalize::{self, EventIdentities, Normalized, PushSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Source of one member's activity. The batch fetcher only sees this.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn fetch_member_activity(
        &self,
        member: &Member,
        purpose: Purpose,
    ) -> Result<Vec<ActivityEvent>, AppError>;
}

/// Fetches and normalizes a member's events from GitHub.
pub struct UserActivityFetcher {
    github: GitHubClient,
    window: chrono::Duration,
    max_events: usize,
    subcall_timeout: Duration,
}

impl UserActivityFetcher {
    pub fn new(
        github: GitHubClient,
        window: chrono::Duration,
        max_events: usize,
        subcall_timeout: Duration,
    ) -> Self {
        Self {
            github,
            window,
            max_events,
            subcall_timeout,
        }
    }

    /// Expand a push through the compare endpoint, falling back to one
    /// summary event when detail is unavailable.
    async fn expand_push(
        &self,
        push: &PushSummary,
        purpose: Purpose,
    ) -> Vec<normalize::EventDraft> {
        let Some((base, head)) = push.compare_range() else {
            return vec![push.summary_draft()];
        };

        let lookup = self
            .github
            .compare_commits(&push.repository, base, head, purpose);

        match tokio::time::timeout(self.subcall_timeout, lookup).await {
            Ok(Ok(Some(compare))) => {
                let drafts = push.commit_drafts(&compare);
                if drafts.is_empty() {
                    vec![push.summary_draft()]
                } else {
                    drafts
                }
            }
            Ok(Ok(None)) => vec![push.summary_draft()],
            Ok(Err(e)) => {
                tracing::debug!(
                    repository = %push.repository,
                    error = %e,
                    "Commit detail unavailable, summarizing push"
                );
                vec![push.summary_draft()]
            }
            Err(_) => {
                tracing::debug!(
                    repository = %push.repository,
                    "Commit detail timed out, summarizing push"
                );
                vec![push.summary_draft()]
            }
        }
    }

    async fn events_from_raw(
        &self,
        member: &Member,
        raw_events: Vec<RawEvent>,
        purpose: Purpose,
        cutoff: DateTime<Utc>,
    ) -> Vec<ActivityEvent> {
        let mut events = Vec::new();
        let mut identities = EventIdentities::new();

        // Skip old events before any compare call is spent on them.
        for raw in raw_events.iter().filter(|r| r.created_at >= cutoff) {
            let drafts = match normalize::normalize(raw) {
                Normalized::Events(drafts) => drafts,
                Normalized::PushWithoutCommits(push) => self.expand_push(&push, purpose).await,
                Normalized::Ignored => continue,
            };
            events.extend(normalize::assemble(member, raw, drafts, &mut identities));
        }

        finalize_events(events, cutoff, self.max_events)
    }
}

#[async_trait]
impl ActivitySource for UserActivityFetcher {
    async fn fetch_member_activity(
        &self,
        member: &Member,
        purpose: Purpose,
    ) -> Result<Vec<ActivityEvent>, AppError> {
        let Some(username) = member.username() else {
            return Ok(Vec::new());
        };

        let cutoff = Utc::now() - self.window;

        let Some(raw_events) = self.github.list_public_events(username, purpose).await? else {
            tracing::debug!(member_id = %member.id, username, "GitHub user not found");
            return Ok(Vec::new());
        };

        let events = self
            .events_from_raw(member, raw_events, purpose, cutoff)
            .await;

        tracing::debug!(
            member_id = %member.id,
            username,
            purpose = %purpose,
            events = events.len(),
            "Fetched member activity"
        );

        Ok(events)
    }
}

/// Drop events older than `cutoff`, sort newest first, keep at most `max`.
pub fn finalize_events(
    mut events: Vec<ActivityEvent>,
    cutoff: DateTime<Utc>,
    max: usize,
) -> Vec<ActivityEvent> {
    events.retain(|e| e.occurred_at >= cutoff);
    sort_newest_first(&mut events);
    events.truncate(max);
    events
}
