// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Community Feed: merged GitHub activity for a community of developers
//!
//! This crate provides the backend that fetches members' public GitHub
//! activity across a pool of API tokens, caches the merged feed, and keeps it
//! fresh with a background scheduler.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{CacheStore, MemberDirectory};
use services::{
    ActivityCache, ActivitySource, BatchFetcher, CredentialPool, FeedService, GitHubClient,
    ManualRefreshGate, MemberStatsService, RefreshScheduler, UserActivityFetcher,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub pool: Arc<CredentialPool>,
    pub feed: Arc<FeedService>,
    pub scheduler: Arc<RefreshScheduler>,
    pub stats: MemberStatsService,
}

impl AppState {
    /// Wire every service from one config, one credential pool and the
    /// storage collaborators.
    pub fn build(
        config: Config,
        pool: Arc<CredentialPool>,
        directory: Arc<dyn MemberDirectory>,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        let github = GitHubClient::new(
            &config.github_api_url,
            &config.github_graphql_url,
            pool.clone(),
        );
        let source: Arc<dyn ActivitySource> = Arc::new(UserActivityFetcher::new(
            github.clone(),
            config.activity_window,
            config.max_events_per_member,
            config.subcall_timeout,
        ));

        Self::with_source(config, pool, directory, store, source, github)
    }

    /// Same as `build`, with an explicit activity source.
    pub fn with_source(
        config: Config,
        pool: Arc<CredentialPool>,
        directory: Arc<dyn MemberDirectory>,
        store: Arc<dyn CacheStore>,
        source: Arc<dyn ActivitySource>,
        github: GitHubClient,
    ) -> Self {
        let batch = BatchFetcher::new(source, pool.len(), config.member_fetch_timeout);
        let cache = ActivityCache::new(store.clone());
        let gate = ManualRefreshGate::new(store, config.manual_refresh_cooldown);
        let feed = Arc::new(FeedService::new(directory.clone(), batch, cache, gate));

        let scheduler = Arc::new(RefreshScheduler::new(
            feed.clone(),
            pool.clone(),
            config.refresh_interval,
            config.freshness_threshold,
        ));

        let stats = MemberStatsService::new(directory, github, config.subcall_timeout);

        Self {
            config,
            pool,
            feed,
            scheduler,
            stats,
        }
    }
}
