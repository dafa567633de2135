// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-member GitHub statistics.
//!
//! Computed on demand from the profile, repository and language endpoints
//! plus two GraphQL search counts. Nothing here is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Aggregate statistics for one member.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct MemberStats {
    pub member_id: String,
    pub username: String,
    pub public_repos: u32,
    pub followers: u32,
    pub following: u32,
    /// Sum of stars over owned repositories
    pub total_stars: u64,
    /// Languages by byte count, largest first
    pub languages: Vec<LanguageShare>,
    pub pull_requests: u64,
    pub issues: u64,
    pub fetched_at: DateTime<Utc>,
}

/// One language's share of the member's code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LanguageShare {
    pub name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub bytes: u64,
    /// Percentage of all bytes, rounded to one decimal
    pub percent: f64,
}

/// Merge per-repository language maps into shares, largest first.
pub fn aggregate_languages<'a>(
    per_repo: impl IntoIterator<Item = &'a HashMap<String, u64>>,
) -> Vec<LanguageShare> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for languages in per_repo {
        for (name, bytes) in languages {
            *totals.entry(name.as_str()).or_default() += bytes;
        }
    }

    let sum: u64 = totals.values().sum();
    if sum == 0 {
        return Vec::new();
    }

    let mut shares: Vec<LanguageShare> = totals
        .into_iter()
        .map(|(name, bytes)| LanguageShare {
            name: name.to_string(),
            bytes,
            percent: ((bytes as f64 / sum as f64) * 1000.0).round() / 10.0,
        })
        .collect();

    shares.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.name.cmp(&b.name)));
    shares
}
