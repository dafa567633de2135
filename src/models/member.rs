// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Community member model (read-only view of the user directory).

use serde::{Deserialize, Serialize};

/// Member record as stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Directory ID (also used as document ID)
    pub id: String,
    /// Name shown in the feed
    pub display_name: String,
    /// GitHub login, if the member linked one
    #[serde(default)]
    pub external_username: Option<String>,
    /// Profile picture URL
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Member {
    /// GitHub login, if present and non-blank.
    pub fn username(&self) -> Option<&str> {
        self.external_username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Members without a GitHub login are never fetched.
    pub fn is_fetchable(&self) -> bool {
        self.username().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(username: Option<&str>) -> Member {
        Member {
            id: "m1".to_string(),
            display_name: "Ada".to_string(),
            external_username: username.map(str::to_string),
            avatar_url: None,
        }
    }

    #[test]
    fn test_blank_username_is_not_fetchable() {
        assert!(!member(None).is_fetchable());
        assert!(!member(Some("   ")).is_fetchable());
        assert!(member(Some("ada")).is_fetchable());
    }

    #[test]
    fn test_username_is_trimmed() {
        assert_eq!(member(Some(" ada ")).username(), Some("ada"));
    }
}
