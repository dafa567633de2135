// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mapping of raw GitHub events onto feed events.
//!
//! Pure functions only. The one network-dependent case (a push whose
//! payload carries no commits) is reported back to the caller as
//! `Normalized::PushWithoutCommits` so it can look up commit detail.

use crate::models::{ActivityEvent, ActivityKind, Actor, Member};
use crate::services::github::{CompareResponse, RawEvent};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Git's all-zero SHA, used as `before` when a branch is created.
const NULL_SHA: &str = "0000000000000000000000000000000000000000";

/// An event before it is given an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub kind: ActivityKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Push whose commits must be looked up (or summarized).
#[derive(Debug, Clone, PartialEq)]
pub struct PushSummary {
    pub repository: String,
    pub branch: String,
    pub before: Option<String>,
    pub head: Option<String>,
    /// Commit count reported by the payload
    pub size: u64,
    pub occurred_at: DateTime<Utc>,
}

impl PushSummary {
    /// Range usable with the compare endpoint, if both ends are known.
    pub fn compare_range(&self) -> Option<(&str, &str)> {
        match (self.before.as_deref(), self.head.as_deref()) {
            (Some(before), Some(head)) if before != NULL_SHA && !before.is_empty() => {
                Some((before, head))
            }
            _ => None,
        }
    }

    /// Single "pushed k commits" event used when detail is unobtainable.
    pub fn summary_draft(&self) -> EventDraft {
        let count = self.size.max(1);
        let noun = if count == 1 { "commit" } else { "commits" };
        EventDraft {
            kind: ActivityKind::Commit,
            message: format!("Pushed {} {} to {}", count, noun, self.branch),
            occurred_at: self.occurred_at,
        }
    }

    /// One event per compared commit. Empty if the compare had no commits.
    pub fn commit_drafts(&self, compare: &CompareResponse) -> Vec<EventDraft> {
        compare
            .commits
            .iter()
            .map(|c| EventDraft {
                kind: ActivityKind::Commit,
                message: first_line(&c.commit.message),
                occurred_at: self.occurred_at,
            })
            .collect()
    }
}

/// Result of normalizing one raw event.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Events(Vec<EventDraft>),
    PushWithoutCommits(PushSummary),
    /// Event type not shown in the feed
    Ignored,
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref", default)]
    git_ref: Option<String>,
    #[serde(default)]
    before: Option<String>,
    #[serde(default)]
    head: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    commits: Vec<PushCommit>,
}

#[derive(Debug, Deserialize)]
struct PushCommit {
    message: String,
}

#[derive(Debug, Deserialize)]
struct NumberedItem {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    merged: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    action: String,
    pull_request: NumberedItem,
}

#[derive(Debug, Deserialize)]
struct IssuesPayload {
    action: String,
    issue: NumberedItem,
}

#[derive(Debug, Deserialize)]
struct CreatePayload {
    ref_type: String,
    #[serde(rename = "ref", default)]
    git_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForkPayload {
    forkee: Forkee,
}

#[derive(Debug, Deserialize)]
struct Forkee {
    full_name: String,
}

fn payload<T: for<'de> Deserialize<'de>>(raw: &RawEvent) -> Option<T> {
    match serde_json::from_value(raw.payload.clone()) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::debug!(
                event_id = %raw.id,
                event_type = %raw.event_type,
                error = %e,
                "Skipping event with unexpected payload"
            );
            None
        }
    }
}

fn single(kind: ActivityKind, message: String, at: DateTime<Utc>) -> Normalized {
    Normalized::Events(vec![EventDraft {
        kind,
        message,
        occurred_at: at,
    }])
}

/// Map one raw event.
pub fn normalize(raw: &RawEvent) -> Normalized {
    let at = raw.created_at;
    let repo = raw.repo.name.as_str();

    match raw.event_type.as_str() {
        "PushEvent" => {
            let Some(push) = payload::<PushPayload>(raw) else {
                return Normalized::Ignored;
            };
            if push.commits.is_empty() {
                return Normalized::PushWithoutCommits(PushSummary {
                    repository: repo.to_string(),
                    branch: branch_name(push.git_ref.as_deref()),
                    before: push.before,
                    head: push.head,
                    size: push.size.unwrap_or(0),
                    occurred_at: at,
                });
            }
            Normalized::Events(
                push.commits
                    .iter()
                    .map(|c| EventDraft {
                        kind: ActivityKind::Commit,
                        message: first_line(&c.message),
                        occurred_at: at,
                    })
                    .collect(),
            )
        }
        "PullRequestEvent" => match payload::<PullRequestPayload>(raw) {
            Some(p) => {
                let action = if p.action == "closed" && p.pull_request.merged == Some(true) {
                    "merged"
                } else {
                    p.action.as_str()
                };
                single(
                    ActivityKind::PullRequest,
                    format!(
                        "{} pull request #{}: {}",
                        capitalize(action),
                        p.pull_request.number,
                        p.pull_request.title
                    ),
                    at,
                )
            }
            None => Normalized::Ignored,
        },
        "IssuesEvent" => match payload::<IssuesPayload>(raw) {
            Some(p) => single(
                ActivityKind::Issue,
                format!(
                    "{} issue #{}: {}",
                    capitalize(&p.action),
                    p.issue.number,
                    p.issue.title
                ),
                at,
            ),
            None => Normalized::Ignored,
        },
        "IssueCommentEvent" => match payload::<IssuesPayload>(raw) {
            Some(p) => single(
                ActivityKind::Issue,
                format!("Commented on issue #{}: {}", p.issue.number, p.issue.title),
                at,
            ),
            None => Normalized::Ignored,
        },
        "ForkEvent" => match payload::<ForkPayload>(raw) {
            Some(p) => single(
                ActivityKind::Fork,
                format!("Forked {} to {}", repo, p.forkee.full_name),
                at,
            ),
            None => Normalized::Ignored,
        },
        "WatchEvent" => single(ActivityKind::Star, format!("Starred {}", repo), at),
        "CreateEvent" => match payload::<CreatePayload>(raw) {
            Some(p) if p.ref_type == "repository" => {
                single(ActivityKind::Create, format!("Created repository {}", repo), at)
            }
            Some(p) => single(
                ActivityKind::Create,
                format!(
                    "Created {} {}",
                    p.ref_type,
                    p.git_ref.as_deref().unwrap_or_default()
                )
                .trim_end()
                .to_string(),
                at,
            ),
            None => Normalized::Ignored,
        },
        _ => Normalized::Ignored,
    }
}

/// Identity allocator for one member's fetch.
///
/// The identity index is the ordinal among events sharing
/// `(occurred_at, kind, repository)`, counted in upstream order. Distinct
/// upstream events in the same second therefore get distinct ids, and the
/// same upstream set always yields the same ids.
#[derive(Debug, Default)]
pub struct EventIdentities {
    seen: HashMap<(DateTime<Utc>, ActivityKind, String), usize>,
}

impl EventIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(
        &mut self,
        member_id: &str,
        occurred_at: DateTime<Utc>,
        kind: ActivityKind,
        repository: &str,
    ) -> String {
        let ordinal = self
            .seen
            .entry((occurred_at, kind, repository.to_string()))
            .or_insert(0);
        let index = *ordinal;
        *ordinal += 1;
        ActivityEvent::derive_id(member_id, occurred_at, kind, repository, index)
    }
}

/// Give drafts their identity and actor.
pub fn assemble(
    member: &Member,
    raw: &RawEvent,
    drafts: Vec<EventDraft>,
    identities: &mut EventIdentities,
) -> Vec<ActivityEvent> {
    let actor = Actor {
        name: member.display_name.clone(),
        username: Some(raw.actor.login.clone()),
        avatar_url: member
            .avatar_url
            .clone()
            .or_else(|| raw.actor.avatar_url.clone()),
    };

    drafts
        .into_iter()
        .map(|draft| ActivityEvent {
            id: identities.next_id(&member.id, draft.occurred_at, draft.kind, &raw.repo.name),
            kind: draft.kind,
            message: draft.message,
            repository: raw.repo.name.clone(),
            occurred_at: draft.occurred_at,
            actor: actor.clone(),
        })
        .collect()
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim().to_string()
}

fn branch_name(git_ref: Option<&str>) -> String {
    let git_ref = git_ref.unwrap_or_default();
    git_ref
        .strip_prefix("refs/heads/")
        .unwrap_or(git_ref)
        .to_string()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
