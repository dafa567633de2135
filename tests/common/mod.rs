// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use community_feed::config::Config;
use community_feed::db::{CacheStore, FirestoreDb, MemberDirectory, MemoryStore};
use community_feed::error::AppError;
use community_feed::middleware::auth::create_jwt;
use community_feed::models::{ActivityEvent, ActivityKind, Actor, Member};
use community_feed::routes::create_router;
use community_feed::services::{ActivitySource, CredentialPool, GitHubClient, Purpose};
use community_feed::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Offline Firestore client; every call fails.
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[allow(dead_code)]
pub fn member(id: &str) -> Member {
    Member {
        id: id.to_string(),
        display_name: format!("Member {}", id),
        external_username: Some(format!("gh-{}", id)),
        avatar_url: None,
    }
}

#[allow(dead_code)]
pub fn members(n: usize) -> Vec<Member> {
    (0..n).map(|i| member(&format!("m{}", i))).collect()
}

/// An event for `member_id` that happened `minutes_ago`.
#[allow(dead_code)]
pub fn event(member_id: &str, minutes_ago: i64, index: usize) -> ActivityEvent {
    let occurred_at = Utc::now() - chrono::Duration::minutes(minutes_ago);
    event_at(member_id, occurred_at, index)
}

#[allow(dead_code)]
pub fn event_at(member_id: &str, occurred_at: DateTime<Utc>, index: usize) -> ActivityEvent {
    let repository = format!("community/{}", member_id);
    ActivityEvent {
        id: ActivityEvent::derive_id(
            member_id,
            occurred_at,
            ActivityKind::Commit,
            &repository,
            index,
        ),
        kind: ActivityKind::Commit,
        message: format!("Commit {} by {}", index, member_id),
        repository,
        occurred_at,
        actor: Actor {
            name: format!("Member {}", member_id),
            username: Some(format!("gh-{}", member_id)),
            avatar_url: None,
        },
    }
}

// ─── Scripted activity source ────────────────────────────────────────────────

/// What the scripted source does for one member.
#[allow(dead_code)]
#[derive(Clone)]
pub enum Script {
    Events(Vec<ActivityEvent>),
    Fail,
    /// Sleep before answering (for timeout tests)
    Slow(Duration, Vec<ActivityEvent>),
}

/// Activity source answering from a per-member script and recording calls.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, Script>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, Purpose)>>,
}

#[allow(dead_code)]
impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, member_id: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(member_id.to_string(), script);
    }

    /// Each member gets `per_member` events spaced a minute apart.
    pub fn with_events(members: &[Member], per_member: usize) -> Self {
        let source = Self::new();
        for (m, member) in members.iter().enumerate() {
            let events = (0..per_member)
                .map(|i| event(&member.id, (m * per_member + i) as i64, i))
                .collect();
            source.script(&member.id, Script::Events(events));
        }
        source
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (member id, purpose) of every call so far.
    pub fn seen(&self) -> Vec<(String, Purpose)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn purpose_of(&self, member_id: &str) -> Option<Purpose> {
        self.seen()
            .into_iter()
            .find(|(id, _)| id == member_id)
            .map(|(_, p)| p)
    }
}

#[async_trait]
impl ActivitySource for ScriptedSource {
    async fn fetch_member_activity(
        &self,
        member: &Member,
        purpose: Purpose,
    ) -> Result<Vec<ActivityEvent>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((member.id.clone(), purpose));

        let script = self.scripts.lock().unwrap().get(&member.id).cloned();
        match script {
            Some(Script::Events(events)) => Ok(events),
            Some(Script::Fail) => Err(AppError::GitHubApi("HTTP 502: scripted".to_string())),
            Some(Script::Slow(delay, events)) => {
                tokio::time::sleep(delay).await;
                Ok(events)
            }
            None => Ok(Vec::new()),
        }
    }
}

// ─── App construction ────────────────────────────────────────────────────────

/// Test app with handles on its collaborators.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub source: Arc<ScriptedSource>,
}

/// App over an in-memory store seeded with `seed`, fetching from `source`.
#[allow(dead_code)]
pub fn create_test_app(seed: Vec<Member>, source: ScriptedSource) -> TestApp {
    let store = Arc::new(MemoryStore::with_members(seed));
    let source = Arc::new(source);
    let state = build_state(
        Config::test_default(),
        store.clone(),
        store.clone(),
        source.clone(),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        source,
    }
}

#[allow(dead_code)]
pub fn build_state(
    config: Config,
    directory: Arc<dyn MemberDirectory>,
    store: Arc<dyn CacheStore>,
    source: Arc<dyn ActivitySource>,
) -> Arc<AppState> {
    let pool = Arc::new(
        CredentialPool::new(config.github_tokens.clone()).expect("test config has tokens"),
    );
    let github = GitHubClient::new(
        &config.github_api_url,
        &config.github_graphql_url,
        pool.clone(),
    );
    Arc::new(AppState::with_source(
        config, pool, directory, store, source, github,
    ))
}

/// Session token for `member_id` signed with the test key.
#[allow(dead_code)]
pub fn create_test_jwt(member_id: &str) -> String {
    create_jwt(member_id, &Config::test_default().jwt_signing_key).expect("sign test jwt")
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("body is JSON")
}
