// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity cache policy over the shared cache store, plus pagination.

use crate::db::CacheStore;
use crate::error::AppError;
use crate::models::{ActivityCacheEntry, ActivityEvent};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Merged feed cache.
///
/// Writes are best effort: a store failure is logged and the freshly built
/// entry is still handed back so the caller can serve it.
#[derive(Clone)]
pub struct ActivityCache {
    store: Arc<dyn CacheStore>,
}

impl ActivityCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Current entry, or `None` when absent or when `force_fresh` is set.
    pub async fn read(&self, force_fresh: bool) -> Result<Option<ActivityCacheEntry>, AppError> {
        if force_fresh {
            return Ok(None);
        }
        self.store.get_feed().await
    }

    /// Replace the entry with `events`, stamped now.
    pub async fn write(&self, events: Vec<ActivityEvent>) -> ActivityCacheEntry {
        self.write_at(events, Utc::now()).await
    }

    pub async fn write_at(&self, events: Vec<ActivityEvent>, now: DateTime<Utc>) -> ActivityCacheEntry {
        let entry = ActivityCacheEntry::new(events, now);

        match self.store.put_feed(&entry).await {
            Ok(()) => tracing::info!(events = entry.events.len(), "Activity cache written"),
            Err(e) => tracing::warn!(
                error = %e,
                events = entry.events.len(),
                "Failed to write activity cache, serving uncached"
            ),
        }

        entry
    }

    /// Age of the current entry; `None` if nothing is cached.
    pub async fn age(&self) -> Result<Option<Duration>, AppError> {
        self.age_at(Utc::now()).await
    }

    pub async fn age_at(&self, now: DateTime<Utc>) -> Result<Option<Duration>, AppError> {
        let entry = self.store.get_feed().await?;
        Ok(entry.map(|e| e.age_at(now)))
    }

    /// Drop the entry.
    pub async fn clear(&self) -> Result<(), AppError> {
        self.store.delete_feed().await?;
        tracing::info!("Activity cache cleared");
        Ok(())
    }
}

/// One page of the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub activities: Vec<ActivityEvent>,
    pub total: usize,
    pub has_more: bool,
    /// Offset of the following page, if any
    pub next_offset: Option<usize>,
}

/// Slice an already sorted list.
pub fn paginate(events: &[ActivityEvent], offset: usize, limit: usize) -> FeedPage {
    let total = events.len();
    let end = offset.saturating_add(limit);
    let has_more = end < total;

    let start = offset.min(total);
    let activities = events[start..end.min(total)].to_vec();

    FeedPage {
        activities,
        total,
        has_more,
        next_offset: has_more.then_some(end),
    }
}

/// Opaque cursor for the page starting at `offset`.
pub fn encode_cursor(offset: usize) -> String {
    URL_SAFE_NO_PAD.encode(format!("offset:{}", offset))
}

pub fn decode_cursor(cursor: &str) -> Result<usize, AppError> {
    let invalid_cursor = || AppError::BadRequest("Invalid 'cursor' parameter".to_string());

    let decoded = URL_SAFE_NO_PAD.decode(cursor).map_err(|_| invalid_cursor())?;
    let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;

    decoded_str
        .strip_prefix("offset:")
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(invalid_cursor)
}
