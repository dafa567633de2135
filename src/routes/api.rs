// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated members.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::MemberStats;
use crate::services::cache::decode_cursor;
use crate::services::credentials::CredentialUsage;
use crate::services::feed::{FeedQuery, FeedResponse};
use crate::services::SchedulerState;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities", get(get_activities))
        .route("/api/feed/status", get(get_feed_status))
        .route("/api/members/{id}/stats", get(get_member_stats))
}

// ─── Activity Feed ───────────────────────────────────────────

/// Query parameters for the feed.
#[derive(Deserialize, Debug)]
pub struct ActivitiesQuery {
    /// Page size (default 20, max 100)
    limit: Option<usize>,
    offset: Option<usize>,
    /// Opaque token from a previous `nextCursor`
    cursor: Option<String>,
    /// Force a manual refresh (rate limited per member)
    #[serde(default)]
    refresh: bool,
}

impl ActivitiesQuery {
    fn into_feed_query(self) -> Result<FeedQuery> {
        let offset = match (self.offset, self.cursor.as_deref()) {
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "Use either 'offset' or 'cursor', not both".to_string(),
                ))
            }
            (Some(offset), None) => offset,
            (None, Some(cursor)) => decode_cursor(cursor)?,
            (None, None) => 0,
        };
        Ok(FeedQuery::new(offset, self.limit, self.refresh))
    }
}

/// Page of the merged feed.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<FeedResponse>> {
    tracing::debug!(
        member_id = %user.member_id,
        limit = ?params.limit,
        offset = ?params.offset,
        cursor = ?params.cursor,
        refresh = params.refresh,
        "Fetching activities"
    );

    let query = params.into_feed_query()?;
    let response = state.feed.read_page(query, &user.member_id).await?;
    Ok(Json(response))
}

// ─── Feed Status ─────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatusResponse {
    pub scheduler_running: bool,
    pub refreshing: bool,
    /// Seconds since the cached feed was computed; null when nothing is cached
    pub cache_age_secs: Option<u64>,
    pub credentials: Vec<CredentialUsage>,
}

/// Scheduler state, cache age and per-credential call counts since the last tick.
async fn get_feed_status(State(state): State<Arc<AppState>>) -> Result<Json<FeedStatusResponse>> {
    let cache_age_secs = state
        .feed
        .cache()
        .age()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Could not read cache age for status");
            e
        })
        .ok()
        .flatten()
        .map(|age| age.as_secs());

    Ok(Json(FeedStatusResponse {
        scheduler_running: state.scheduler.is_running(),
        refreshing: state.scheduler.state() == SchedulerState::Refreshing,
        cache_age_secs,
        credentials: state.pool.usage(),
    }))
}

// ─── Member Stats ────────────────────────────────────────────

/// GitHub statistics for one member.
async fn get_member_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(member_id): Path<String>,
) -> Result<Json<MemberStats>> {
    tracing::debug!(requester = %user.member_id, member_id = %member_id, "Fetching member stats");

    let stats = state.stats.fetch_stats_for_id(&member_id).await?;
    Ok(Json(stats))
}
