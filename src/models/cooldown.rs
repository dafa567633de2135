// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Manual refresh cooldown record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last manual refresh by one requester.
///
/// Stored at: `refresh_cooldowns/{requester_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshCooldownEntry {
    pub requester_id: String,
    pub last_refresh_at: DateTime<Utc>,
    /// Entry is ignored (and may be deleted) once this passes
    pub expires_at: DateTime<Utc>,
}

impl RefreshCooldownEntry {
    pub fn new(requester_id: &str, last_refresh_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            requester_id: requester_id.to_string(),
            last_refresh_at,
            expires_at: last_refresh_at + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
