// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod cooldown;
pub mod member;
pub mod stats;

pub use activity::{ActivityCacheEntry, ActivityEvent, ActivityKind, Actor};
pub use cooldown::RefreshCooldownEntry;
pub use member::Member;
pub use stats::{LanguageShare, MemberStats};
