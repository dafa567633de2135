// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - activity pipeline and GitHub access.

pub mod batch;
pub mod cache;
pub mod credentials;
pub mod feed;
pub mod fetcher;
pub mod github;
pub mod normalize;
pub mod refresh_gate;
pub mod scheduler;
pub mod stats;

pub use batch::{BatchFetcher, BatchResult};
pub use cache::ActivityCache;
pub use credentials::{CredentialPool, Purpose};
pub use feed::{FeedQuery, FeedResponse, FeedService, RefreshReport};
pub use fetcher::{ActivitySource, UserActivityFetcher};
pub use github::GitHubClient;
pub use refresh_gate::{GateDecision, ManualRefreshGate};
pub use scheduler::{RefreshScheduler, SchedulerState, TickOutcome};
pub use stats::MemberStatsService;
