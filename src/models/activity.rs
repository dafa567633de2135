// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalized activity events and the cached feed entry.

use crate::time_utils::{elapsed_since, format_utc_rfc3339};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Hex characters kept from the identity digest.
const EVENT_ID_LEN: usize = 32;

/// Kind of activity shown in the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Commit,
    PullRequest,
    Issue,
    Fork,
    Star,
    Create,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Commit => "commit",
            ActivityKind::PullRequest => "pull_request",
            ActivityKind::Issue => "issue",
            ActivityKind::Fork => "fork",
            ActivityKind::Star => "star",
            ActivityKind::Create => "create",
        }
    }
}

/// Who performed the activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// One entry of the merged feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: String,
    pub kind: ActivityKind,
    pub message: String,
    /// `owner/name` of the repository
    pub repository: String,
    pub occurred_at: DateTime<Utc>,
    pub actor: Actor,
}

impl ActivityEvent {
    /// Stable identity for an event.
    ///
    /// `index` is the ordinal of this event among those in one member's
    /// fetch that share `occurred_at`, `kind` and `repository`.
    pub fn derive_id(
        member_id: &str,
        occurred_at: DateTime<Utc>,
        kind: ActivityKind,
        repository: &str,
        index: usize,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(member_id.as_bytes());
        hasher.update(b"|");
        hasher.update(format_utc_rfc3339(occurred_at).as_bytes());
        hasher.update(b"|");
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(repository.as_bytes());
        hasher.update(b"|");
        hasher.update(index.to_string().as_bytes());
        let mut id = hex::encode(hasher.finalize());
        id.truncate(EVENT_ID_LEN);
        id
    }
}

/// Sort newest first. Ties are broken by id so the order is deterministic.
pub fn sort_newest_first(events: &mut [ActivityEvent]) {
    events.sort_by(|a, b| {
        b.occurred_at
            .cmp(&a.occurred_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Cached, merged feed. Replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCacheEntry {
    /// Always sorted newest first
    pub events: Vec<ActivityEvent>,
    /// When the set was computed
    pub cached_at: DateTime<Utc>,
}

impl ActivityCacheEntry {
    /// Build an entry, sorting the events.
    pub fn new(mut events: Vec<ActivityEvent>, cached_at: DateTime<Utc>) -> Self {
        sort_newest_first(&mut events);
        Self { events, cached_at }
    }

    /// Age of the entry at `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        elapsed_since(self.cached_at, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, secs: i64) -> ActivityEvent {
        ActivityEvent {
            id: id.to_string(),
            kind: ActivityKind::Commit,
            message: "msg".to_string(),
            repository: "octo/repo".to_string(),
            occurred_at: DateTime::from_timestamp(secs, 0).unwrap(),
            actor: Actor {
                name: "Octo".to_string(),
                username: Some("octo".to_string()),
                avatar_url: None,
            },
        }
    }

    #[test]
    fn test_derive_id_is_stable() {
        let at = DateTime::from_timestamp(1_704_103_200, 0).unwrap();
        let a = ActivityEvent::derive_id("m1", at, ActivityKind::Commit, "octo/repo", 0);
        let b = ActivityEvent::derive_id("m1", at, ActivityKind::Commit, "octo/repo", 0);
        assert_eq!(a, b);
        assert_eq!(a.len(), EVENT_ID_LEN);
    }

    #[test]
    fn test_derive_id_varies_with_each_component() {
        let at = DateTime::from_timestamp(1_704_103_200, 0).unwrap();
        let base = ActivityEvent::derive_id("m1", at, ActivityKind::Commit, "octo/repo", 0);

        let later = at + chrono::Duration::seconds(1);
        assert_ne!(
            base,
            ActivityEvent::derive_id("m2", at, ActivityKind::Commit, "octo/repo", 0)
        );
        assert_ne!(
            base,
            ActivityEvent::derive_id("m1", later, ActivityKind::Commit, "octo/repo", 0)
        );
        assert_ne!(
            base,
            ActivityEvent::derive_id("m1", at, ActivityKind::Issue, "octo/repo", 0)
        );
        assert_ne!(
            base,
            ActivityEvent::derive_id("m1", at, ActivityKind::Commit, "octo/other", 0)
        );
        assert_ne!(
            base,
            ActivityEvent::derive_id("m1", at, ActivityKind::Commit, "octo/repo", 1)
        );
    }

    #[test]
    fn test_cache_entry_sorts_newest_first() {
        let now = Utc::now();
        let entry = ActivityCacheEntry::new(
            vec![event("a", 100), event("b", 300), event("c", 200)],
            now,
        );
        let ids: Vec<&str> = entry.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_serialized_shape_uses_camel_case() {
        let json = serde_json::to_value(event("a", 100)).unwrap();
        assert!(json.get("occurredAt").is_some());
        assert_eq!(json["kind"], "commit");
        assert!(json["actor"].get("avatarUrl").is_some());
    }

    #[test]
    fn test_cache_entry_round_trips_through_json() {
        let entry = ActivityCacheEntry::new(vec![event("a", 100), event("b", 200)], Utc::now());
        let json = serde_json::to_string(&entry).unwrap();
        let back: ActivityCacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
