// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for single-instance deployments and tests.
//!
//! The feed is held as an `Arc` that is swapped on write, so concurrent
//! readers always see one complete entry.

use super::{CacheStore, MemberDirectory};
use crate::error::AppError;
use crate::models::{ActivityCacheEntry, Member, RefreshCooldownEntry};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Member directory plus shared cache, all in memory.
#[derive(Default)]
pub struct MemoryStore {
    members: DashMap<String, Member>,
    feed: RwLock<Option<Arc<ActivityCacheEntry>>>,
    cooldowns: DashMap<String, RefreshCooldownEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the directory.
    pub fn with_members(members: impl IntoIterator<Item = Member>) -> Self {
        let store = Self::new();
        for member in members {
            store.upsert_member(member);
        }
        store
    }

    pub fn upsert_member(&self, member: Member) {
        self.members.insert(member.id.clone(), member);
    }
}

#[async_trait]
impl MemberDirectory for MemoryStore {
    async fn list_members_with_external_username(&self) -> Result<Vec<Member>, AppError> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .filter(|m| m.is_fetchable())
            .map(|m| m.value().clone())
            .collect();
        // DashMap iteration order is arbitrary; keep batches reproducible.
        members.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(members)
    }

    async fn get_member(&self, id: &str) -> Result<Option<Member>, AppError> {
        Ok(self.members.get(id).map(|m| m.value().clone()))
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get_feed(&self) -> Result<Option<ActivityCacheEntry>, AppError> {
        let current = self.feed.read().await.clone();
        Ok(current.map(|entry| entry.as_ref().clone()))
    }

    async fn put_feed(&self, entry: &ActivityCacheEntry) -> Result<(), AppError> {
        let next = Arc::new(entry.clone());
        *self.feed.write().await = Some(next);
        Ok(())
    }

    async fn delete_feed(&self) -> Result<(), AppError> {
        *self.feed.write().await = None;
        Ok(())
    }

    async fn get_cooldown(
        &self,
        requester_id: &str,
    ) -> Result<Option<RefreshCooldownEntry>, AppError> {
        // Expired entries are dropped here rather than by a sweeper.
        let now = Utc::now();
        self.cooldowns
            .remove_if(requester_id, |_, entry| entry.is_expired_at(now));
        Ok(self.cooldowns.get(requester_id).map(|e| e.value().clone()))
    }

    async fn put_cooldown(&self, entry: &RefreshCooldownEntry) -> Result<(), AppError> {
        self.cooldowns
            .insert(entry.requester_id.clone(), entry.clone());
        Ok(())
    }

    async fn delete_cooldown(&self, requester_id: &str) -> Result<(), AppError> {
        self.cooldowns.remove(requester_id);
        Ok(())
    }
}
