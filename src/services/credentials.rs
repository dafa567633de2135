// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GitHub credential pool.
//!
//! Spreads outbound calls over several tokens by the kind of work being
//! done, so a rate-limited token can be traced back to what exhausted it.
//! Counters are for observability only; nothing here throttles.

use crate::config::ConfigError;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Logical role used to pick a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Primary,
    Secondary,
    Bulk,
    Background,
}

impl Purpose {
    /// All purposes in mapping order.
    pub const ALL: [Purpose; 4] = [
        Purpose::Primary,
        Purpose::Secondary,
        Purpose::Bulk,
        Purpose::Background,
    ];

    /// Fixed slot of this purpose in the mapping table.
    pub fn slot(self) -> usize {
        match self {
            Purpose::Primary => 0,
            Purpose::Secondary => 1,
            Purpose::Bulk => 2,
            Purpose::Background => 3,
        }
    }

    /// Purpose for the `n`th item of a cyclic assignment.
    pub fn cyclic(n: usize) -> Purpose {
        Self::ALL[n % Self::ALL.len()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Primary => "primary",
            Purpose::Secondary => "secondary",
            Purpose::Bulk => "bulk",
            Purpose::Background => "background",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One API token with its usage counter.
pub struct Credential {
    token: String,
    purpose: Purpose,
    calls: AtomicU64,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Purpose this slot was created for.
    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Short, non-secret label for logs.
    pub fn label(&self) -> String {
        let tail: String = self
            .token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("…{}", tail)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.label())
            .field("purpose", &self.purpose)
            .field("calls", &self.calls())
            .finish()
    }
}

/// Usage of one credential at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialUsage {
    pub label: String,
    pub purpose: Purpose,
    pub calls: u64,
}

/// Fixed set of credentials, built once at startup and shared.
#[derive(Debug)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    /// Build the pool. An empty token list is a startup error.
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Result<Self, ConfigError> {
        let credentials: Vec<Credential> = tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| Credential {
                token,
                purpose: Purpose::cyclic(i),
                calls: AtomicU64::new(0),
            })
            .collect();

        if credentials.is_empty() {
            return Err(ConfigError::NoCredentials);
        }

        Ok(Self { credentials })
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Credential mapped to `purpose`, wrapping when the pool is smaller
    /// than the purpose table.
    pub fn select_for_purpose(&self, purpose: Purpose) -> &Credential {
        &self.credentials[purpose.slot() % self.credentials.len()]
    }

    /// Credential with the fewest recorded calls; ties go to pool order.
    pub fn select_least_used(&self) -> &Credential {
        let mut best = &self.credentials[0];
        for credential in &self.credentials[1..] {
            if credential.calls() < best.calls() {
                best = credential;
            }
        }
        best
    }

    pub fn record_call(&self, credential: &Credential, n: u64) {
        credential.calls.fetch_add(n, Ordering::Relaxed);
    }

    pub fn usage(&self) -> Vec<CredentialUsage> {
        self.credentials
            .iter()
            .map(|c| CredentialUsage {
                label: c.label(),
                purpose: c.purpose,
                calls: c.calls(),
            })
            .collect()
    }

    pub fn reset_counters(&self) {
        for credential in &self.credentials {
            credential.calls.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> CredentialPool {
        CredentialPool::new((0..n).map(|i| format!("token_{}", i))).unwrap()
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        let err = CredentialPool::new(Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials));
    }

    #[test]
    fn test_purpose_mapping_is_stable() {
        let pool = pool(4);
        assert_eq!(pool.select_for_purpose(Purpose::Primary).token(), "token_0");
        assert_eq!(pool.select_for_purpose(Purpose::Secondary).token(), "token_1");
        assert_eq!(pool.select_for_purpose(Purpose::Bulk).token(), "token_2");
        assert_eq!(
            pool.select_for_purpose(Purpose::Background).token(),
            "token_3"
        );
    }

    #[test]
    fn test_purpose_mapping_wraps_small_pool() {
        let single = pool(1);
        let pair = pool(2);
        assert_eq!(pair.select_for_purpose(Purpose::Bulk).token(), "token_0");
        assert_eq!(
            pair.select_for_purpose(Purpose::Background).token(),
            "token_1"
        );

        for purpose in Purpose::ALL {
            assert_eq!(single.select_for_purpose(purpose).token(), "token_0");
        }
    }

    #[test]
    fn test_least_used_prefers_pool_order_on_ties() {
        let pool = pool(3);
        assert_eq!(pool.select_least_used().token(), "token_0");

        pool.record_call(pool.select_for_purpose(Purpose::Primary), 2);
        pool.record_call(pool.select_for_purpose(Purpose::Secondary), 1);
        pool.record_call(pool.select_for_purpose(Purpose::Bulk), 1);
        assert_eq!(pool.select_least_used().token(), "token_1");
    }

    #[test]
    fn test_reset_counters() {
        let pool = pool(2);
        pool.record_call(pool.select_for_purpose(Purpose::Primary), 5);
        assert_eq!(pool.usage()[0].calls, 5);

        pool.reset_counters();
        assert!(pool.usage().iter().all(|u| u.calls == 0));
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let pool = CredentialPool::new(vec!["ghp_supersecretABCD".to_string()]).unwrap();
        let debug = format!("{:?}", pool);
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("ABCD"));
    }

    #[test]
    fn test_cyclic_purposes() {
        assert_eq!(Purpose::cyclic(0), Purpose::Primary);
        assert_eq!(Purpose::cyclic(3), Purpose::Background);
        assert_eq!(Purpose::cyclic(4), Purpose::Primary);
    }
}
