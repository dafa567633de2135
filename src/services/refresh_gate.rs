// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-requester cooldown in front of the manual refresh.

use crate::db::CacheStore;
use crate::models::RefreshCooldownEntry;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Result of asking the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Denied { remaining_secs: u64 },
}

/// Keyed cooldown backed by the shared cache store.
///
/// Entries expire lazily: an expired entry found on lookup is simply
/// overwritten. If the store cannot be read the gate lets the request
/// through rather than locking everyone out. A requester's lock is dropped
/// from the map once nobody else is waiting on it.
#[derive(Clone)]
pub struct ManualRefreshGate {
    store: Arc<dyn CacheStore>,
    cooldown: Duration,
    /// Serializes check-and-set per requester
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ManualRefreshGate {
    pub fn new(store: Arc<dyn CacheStore>, cooldown: Duration) -> Self {
        Self {
            store,
            cooldown,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub async fn try_consume(&self, requester_id: &str) -> GateDecision {
        self.try_consume_at(requester_id, Utc::now()).await
    }

    /// Allow and record a refresh at `now`, or deny with the time left.
    pub async fn try_consume_at(&self, requester_id: &str, now: DateTime<Utc>) -> GateDecision {
        let lock = self
            .locks
            .entry(requester_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let decision = {
            let _guard = lock.lock().await;
            self.check_and_record(requester_id, now).await
        };

        // The map and `lock` hold the only references: nobody is queued.
        self.locks
            .remove_if(requester_id, |_, held| Arc::strong_count(held) <= 2);

        decision
    }

    async fn check_and_record(&self, requester_id: &str, now: DateTime<Utc>) -> GateDecision {
        match self.store.get_cooldown(requester_id).await {
            Ok(Some(entry)) if !entry.is_expired_at(now) => {
                let remaining_secs = remaining_secs(entry.expires_at, now);
                tracing::info!(
                    requester_id,
                    remaining_secs,
                    "Manual refresh denied by cooldown"
                );
                return GateDecision::Denied { remaining_secs };
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    requester_id,
                    error = %e,
                    "Cooldown lookup failed, allowing refresh"
                );
            }
        }

        let ttl = chrono::Duration::from_std(self.cooldown).unwrap_or(chrono::Duration::days(1));
        let entry = RefreshCooldownEntry::new(requester_id, now, ttl);
        if let Err(e) = self.store.put_cooldown(&entry).await {
            tracing::warn!(requester_id, error = %e, "Failed to record cooldown");
        }

        GateDecision::Allowed
    }

    /// Give the token back after a refresh that could not run.
    pub async fn refund(&self, requester_id: &str) {
        if let Err(e) = self.store.delete_cooldown(requester_id).await {
            tracing::warn!(requester_id, error = %e, "Failed to refund cooldown");
        } else {
            tracing::debug!(requester_id, "Cooldown refunded");
        }
    }
}

/// Whole seconds until `expires_at`, rounded up and never zero while denied.
fn remaining_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (expires_at - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}
