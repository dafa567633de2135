// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Feed read path and the shared refresh lock.
//!
//! Handles:
//! - Serving pages from the cache, filling it synchronously when cold
//! - Manual refresh behind the per-requester cooldown
//! - Full refreshes for the scheduler
//!
//! Only one full refresh runs at a time. A reader that waited for another
//! refresh reuses its result instead of fetching again. A run in which every
//! member failed never replaces the cached feed.

use crate::db::MemberDirectory;
use crate::error::AppError;
use crate::models::{ActivityCacheEntry, ActivityEvent, Member};
use crate::services::batch::{BatchFetcher, BatchResult};
use crate::services::cache::{encode_cursor, paginate, ActivityCache};
use crate::services::refresh_gate::{GateDecision, ManualRefreshGate};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Validated read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuery {
    pub offset: usize,
    pub limit: usize,
    pub refresh: bool,
}

impl FeedQuery {
    /// Apply the default limit and clamp it to `1..=MAX_PAGE_LIMIT`.
    pub fn new(offset: usize, limit: Option<usize>, refresh: bool) -> Self {
        Self {
            offset,
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            refresh,
        }
    }
}

/// Response for `GET /api/activities`.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub activities: Vec<ActivityEvent>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total: usize,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    /// False when this response was computed for the request
    pub cached: bool,
}

impl FeedResponse {
    fn from_entry(entry: &ActivityCacheEntry, query: &FeedQuery, cached: bool) -> Self {
        let page = paginate(&entry.events, query.offset, query.limit);
        Self {
            activities: page.activities,
            total: page.total,
            has_more: page.has_more,
            next_cursor: page.next_offset.map(encode_cursor),
            cached,
        }
    }
}

/// What a full refresh did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshReport {
    Refreshed {
        events: usize,
        attempted: u32,
        failed: u32,
    },
    /// Nothing to fetch; the cache was left alone
    EmptyDirectory,
}

/// Feed read path, manual refresh and full refresh.
pub struct FeedService {
    directory: Arc<dyn MemberDirectory>,
    batch: BatchFetcher,
    cache: ActivityCache,
    gate: ManualRefreshGate,
    refresh_lock: Mutex<()>,
    /// Set while a batch fetch runs under `refresh_lock`
    refreshing: AtomicBool,
}

/// Raises the refreshing flag for as long as it lives.
struct RefreshingFlag<'a>(&'a AtomicBool);

impl<'a> RefreshingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FeedService {
    pub fn new(
        directory: Arc<dyn MemberDirectory>,
        batch: BatchFetcher,
        cache: ActivityCache,
        gate: ManualRefreshGate,
    ) -> Self {
        Self {
            directory,
            batch,
            cache,
            gate,
            refresh_lock: Mutex::new(()),
            refreshing: AtomicBool::new(false),
        }
    }

    /// True while a batch fetch is running for any caller.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub fn cache(&self) -> &ActivityCache {
        &self.cache
    }

    pub fn gate(&self) -> &ManualRefreshGate {
        &self.gate
    }

    /// Serve one page for `requester_id`.
    pub async fn read_page(
        &self,
        query: FeedQuery,
        requester_id: &str,
    ) -> Result<FeedResponse, AppError> {
        if query.refresh {
            return self.read_after_manual_refresh(query, requester_id).await;
        }

        match self.cache.read(false).await {
            Ok(Some(entry)) => return Ok(FeedResponse::from_entry(&entry, &query, true)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Cache read failed, fetching directly"),
        }

        let (entry, reused) = self.fill_cold_cache().await?;
        Ok(FeedResponse::from_entry(&entry, &query, reused))
    }

    /// Full refresh, waiting for any refresh already running.
    pub async fn refresh(&self) -> Result<RefreshReport, AppError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Full refresh unless one is already running (`None`).
    pub async fn try_refresh(&self) -> Option<Result<RefreshReport, AppError>> {
        let _guard = self.refresh_lock.try_lock().ok()?;
        Some(self.refresh_locked().await)
    }

    async fn refresh_locked(&self) -> Result<RefreshReport, AppError> {
        let members = self.load_members().await?;
        if members.is_empty() {
            tracing::info!("Member directory is empty, skipping refresh");
            return Ok(RefreshReport::EmptyDirectory);
        }

        let result = self.fetch_members(members).await?;
        let attempted = result.attempted;
        let failed = result.failed;
        let entry = self.cache.write(result.events).await;

        Ok(RefreshReport::Refreshed {
            events: entry.events.len(),
            attempted,
            failed,
        })
    }

    /// Cold read: fetch and write, unless a concurrent fill landed while
    /// waiting. The flag is true when that concurrent result is reused.
    async fn fill_cold_cache(&self) -> Result<(ActivityCacheEntry, bool), AppError> {
        let wait_started = Utc::now();
        let _guard = self.refresh_lock.lock().await;

        if let Ok(Some(entry)) = self.cache.read(false).await {
            if entry.cached_at >= wait_started {
                tracing::debug!("Reusing cache filled while waiting");
                return Ok((entry, true));
            }
        }

        let members = self.load_members().await?;
        let result = self.fetch_members(members).await?;
        let entry = self.cache.write(result.events).await;
        Ok((entry, false))
    }

    async fn read_after_manual_refresh(
        &self,
        query: FeedQuery,
        requester_id: &str,
    ) -> Result<FeedResponse, AppError> {
        if let GateDecision::Denied { remaining_secs } = self.gate.try_consume(requester_id).await {
            return Err(AppError::RateLimited { remaining_secs });
        }

        let _guard = self.refresh_lock.lock().await;

        // Load the directory first so a failure leaves the old entry in place.
        let members = match self.load_members().await {
            Ok(members) => members,
            Err(e) => {
                self.gate.refund(requester_id).await;
                return self.stale_or(e, &query).await;
            }
        };

        tracing::info!(requester_id, members = members.len(), "Manual refresh");
        let result = match self.fetch_members(members).await {
            Ok(result) => result,
            Err(e) => {
                self.gate.refund(requester_id).await;
                return self.stale_or(e, &query).await;
            }
        };

        if let Err(e) = self.cache.clear().await {
            tracing::warn!(error = %e, "Failed to clear activity cache");
        }
        let entry = self.cache.write(result.events).await;
        Ok(FeedResponse::from_entry(&entry, &query, false))
    }

    /// Serve whatever is cached, or fail with `err` if nothing is.
    async fn stale_or(&self, err: AppError, query: &FeedQuery) -> Result<FeedResponse, AppError> {
        match self.cache.read(false).await {
            Ok(Some(entry)) => {
                tracing::warn!(error = %err, "Refresh failed, serving previous cache");
                Ok(FeedResponse::from_entry(&entry, query, true))
            }
            _ => Err(err),
        }
    }

    /// Run the batch fetcher. Fails when every attempted member failed, so
    /// callers keep the previous entry instead of caching an empty feed.
    async fn fetch_members(&self, members: Vec<Member>) -> Result<BatchResult, AppError> {
        let _flag = RefreshingFlag::raise(&self.refreshing);
        let result = self.batch.fetch_all(members).await;

        if result.is_total_failure() {
            return Err(AppError::GitHubApi(format!(
                "all {} member fetches failed",
                result.attempted
            )));
        }
        if result.is_partial_failure() {
            tracing::warn!(
                attempted = result.attempted,
                failed = result.failed,
                "Caching partial results"
            );
        }
        Ok(result)
    }

    async fn load_members(&self) -> Result<Vec<Member>, AppError> {
        self.directory
            .list_members_with_external_username()
            .await
            .map_err(|e| match e {
                AppError::DirectoryUnavailable(_) => e,
                other => AppError::DirectoryUnavailable(other.to_string()),
            })
    }
}
