// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Preemptive background refresh.
//!
//! A single timer loop owned by the process. Each tick compares the cache
//! age with the freshness threshold and runs a full refresh when stale.
//! A failed refresh is logged and left for the next tick.

use crate::error::AppError;
use crate::services::credentials::CredentialPool;
use crate::services::feed::{FeedService, RefreshReport};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Refreshing,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Cache younger than the threshold
    Fresh,
    Refreshed,
    /// No members to fetch
    EmptyDirectory,
    /// Another refresh held the lock
    Busy,
    Failed,
}

struct RunningLoop {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Timer-driven refresher for the activity cache.
pub struct RefreshScheduler {
    feed: Arc<FeedService>,
    pool: Arc<CredentialPool>,
    interval: Duration,
    freshness_threshold: Duration,
    running: Mutex<Option<RunningLoop>>,
}

impl RefreshScheduler {
    pub fn new(
        feed: Arc<FeedService>,
        pool: Arc<CredentialPool>,
        interval: Duration,
        freshness_threshold: Duration,
    ) -> Self {
        Self {
            feed,
            pool,
            interval,
            freshness_threshold,
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.feed.is_refreshing() {
            SchedulerState::Refreshing
        } else {
            SchedulerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|running| running.is_some())
            .unwrap_or(false)
    }

    /// Start the timer loop. Returns false if it was already running.
    ///
    /// The first tick fires immediately.
    pub fn start(self: &Arc<Self>) -> bool {
        let Ok(mut running) = self.running.lock() else {
            tracing::error!("Scheduler lock poisoned, not starting");
            return false;
        };
        if running.is_some() {
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let task = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

        *running = Some(RunningLoop { shutdown_tx, task });
        true
    }

    /// Stop the timer loop and wait for it to exit. No refresh starts
    /// after this returns. Returns false if it was not running.
    pub async fn stop(&self) -> bool {
        let running = match self.running.lock() {
            Ok(mut running) => running.take(),
            Err(_) => None,
        };
        let Some(RunningLoop { shutdown_tx, task }) = running else {
            return false;
        };

        let _ = shutdown_tx.send(true);
        task.abort();
        let _ = task.await;

        tracing::info!("Refresh scheduler stopped");
        true
    }

    async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            freshness_threshold_secs = self.freshness_threshold.as_secs(),
            "Refresh scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Refresh scheduler shutting down");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// One check: refresh if the cache is missing or stale.
    pub async fn tick(&self) -> TickOutcome {
        let outcome = match self.feed.cache().age().await {
            Ok(Some(age)) if age < self.freshness_threshold => {
                tracing::debug!(age_secs = age.as_secs(), "Activity cache is fresh");
                TickOutcome::Fresh
            }
            Ok(age) => {
                tracing::info!(
                    age_secs = age.map(|a| a.as_secs()),
                    "Activity cache is stale, refreshing"
                );
                self.refresh_if_idle().await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read cache age, skipping tick");
                TickOutcome::Failed
            }
        };

        self.log_and_reset_usage();
        outcome
    }

    /// Run a refresh now, ignoring cache age and the timer.
    pub async fn force_refresh(&self) -> Result<RefreshReport, AppError> {
        let result = self.feed.refresh().await;

        match &result {
            Ok(report) => tracing::info!(?report, "Forced refresh finished"),
            Err(e) => tracing::error!(error = %e, "Forced refresh failed"),
        }
        result
    }

    async fn refresh_if_idle(&self) -> TickOutcome {
        match self.feed.try_refresh().await {
            None => {
                tracing::info!("Refresh already in progress, skipping tick");
                TickOutcome::Busy
            }
            Some(Ok(RefreshReport::EmptyDirectory)) => TickOutcome::EmptyDirectory,
            Some(Ok(RefreshReport::Refreshed {
                events,
                attempted,
                failed,
            })) => {
                tracing::info!(events, attempted, failed, "Scheduled refresh finished");
                TickOutcome::Refreshed
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Scheduled refresh failed, keeping previous cache");
                TickOutcome::Failed
            }
        }
    }

    fn log_and_reset_usage(&self) {
        for usage in self.pool.usage() {
            tracing::info!(
                credential = %usage.label,
                purpose = %usage.purpose,
                calls = usage.calls,
                "Credential usage"
            );
        }
        self.pool.reset_counters();
    }
}
