// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage collaborators: the member directory and the shared cache.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{ActivityCacheEntry, Member, RefreshCooldownEntry};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    /// Member directory (owned elsewhere, read-only here)
    pub const USERS: &str = "users";
    pub const ACTIVITY_CACHE: &str = "activity_cache";
    pub const REFRESH_COOLDOWNS: &str = "refresh_cooldowns";

    /// Document ID of the merged feed inside `ACTIVITY_CACHE`.
    pub const FEED_DOC_ID: &str = "feed";
}

/// Read-only access to the member directory.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// All members that have a GitHub login.
    async fn list_members_with_external_username(&self) -> Result<Vec<Member>, AppError>;

    async fn get_member(&self, id: &str) -> Result<Option<Member>, AppError>;
}

/// Shared key-value cache holding the feed and the per-requester cooldowns.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_feed(&self) -> Result<Option<ActivityCacheEntry>, AppError>;

    /// Replace the feed entry in one write.
    async fn put_feed(&self, entry: &ActivityCacheEntry) -> Result<(), AppError>;

    async fn delete_feed(&self) -> Result<(), AppError>;

    /// Cooldown entry for a requester. Backends may return an expired
    /// entry; the caller checks.
    async fn get_cooldown(
        &self,
        requester_id: &str,
    ) -> Result<Option<RefreshCooldownEntry>, AppError>;

    async fn put_cooldown(&self, entry: &RefreshCooldownEntry) -> Result<(), AppError>;

    async fn delete_cooldown(&self, requester_id: &str) -> Result<(), AppError>;
}
