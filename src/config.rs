// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! GitHub tokens and the JWT key are read once at startup and kept in
//! memory. The credential pool is built from `github_tokens` in `main`.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which backing store serves the member directory and the shared cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Member directory / cache backend
    pub store_backend: StoreBackend,
    /// GitHub REST base URL
    pub github_api_url: String,
    /// GitHub GraphQL endpoint
    pub github_graphql_url: String,

    // --- Feed policy ---
    /// Scheduler tick period
    pub refresh_interval: Duration,
    /// Maximum cache age before the scheduler refreshes
    pub freshness_threshold: Duration,
    /// Minimum wait between two manual refreshes by one requester
    pub manual_refresh_cooldown: Duration,
    /// Trailing window of upstream events kept in the feed
    pub activity_window: chrono::Duration,
    /// Cap on events contributed by a single member
    pub max_events_per_member: usize,
    /// Timeout for one member's whole fetch
    pub member_fetch_timeout: Duration,
    /// Timeout for secondary calls (commit detail, languages, counts)
    pub subcall_timeout: Duration,

    // --- Secrets ---
    /// GitHub API tokens, one per pool slot
    pub github_tokens: Vec<String>,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60 * 60;
pub const DEFAULT_FRESHNESS_THRESHOLD_SECS: u64 = 60 * 60;
pub const DEFAULT_MANUAL_REFRESH_COOLDOWN_SECS: u64 = 10 * 60;
pub const DEFAULT_ACTIVITY_WINDOW_HOURS: i64 = 36;
pub const DEFAULT_MAX_EVENTS_PER_MEMBER: usize = 30;
pub const DEFAULT_MEMBER_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SUBCALL_TIMEOUT_SECS: u64 = 5;

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            github_api_url: "http://127.0.0.1:9".to_string(),
            github_graphql_url: "http://127.0.0.1:9/graphql".to_string(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            freshness_threshold: Duration::from_secs(DEFAULT_FRESHNESS_THRESHOLD_SECS),
            manual_refresh_cooldown: Duration::from_secs(DEFAULT_MANUAL_REFRESH_COOLDOWN_SECS),
            activity_window: chrono::Duration::hours(DEFAULT_ACTIVITY_WINDOW_HOURS),
            max_events_per_member: DEFAULT_MAX_EVENTS_PER_MEMBER,
            member_fetch_timeout: Duration::from_secs(DEFAULT_MEMBER_FETCH_TIMEOUT_SECS),
            subcall_timeout: Duration::from_secs(DEFAULT_SUBCALL_TIMEOUT_SECS),
            github_tokens: vec!["test_token_a".to_string(), "test_token_b".to_string()],
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "STORE_BACKEND",
                value: raw,
            })?,
            Err(_) => StoreBackend::Firestore,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", 8080)?,
            store_backend,
            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            github_graphql_url: env::var("GITHUB_GRAPHQL_URL")
                .unwrap_or_else(|_| "https://api.github.com/graphql".to_string()),

            refresh_interval: Duration::from_secs(parse_or(
                "REFRESH_INTERVAL_SECS",
                DEFAULT_REFRESH_INTERVAL_SECS,
            )?),
            freshness_threshold: Duration::from_secs(parse_or(
                "FRESHNESS_THRESHOLD_SECS",
                DEFAULT_FRESHNESS_THRESHOLD_SECS,
            )?),
            manual_refresh_cooldown: Duration::from_secs(parse_or(
                "MANUAL_REFRESH_COOLDOWN_SECS",
                DEFAULT_MANUAL_REFRESH_COOLDOWN_SECS,
            )?),
            activity_window: chrono::Duration::hours(parse_or(
                "ACTIVITY_WINDOW_HOURS",
                DEFAULT_ACTIVITY_WINDOW_HOURS,
            )?),
            max_events_per_member: parse_or(
                "MAX_EVENTS_PER_MEMBER",
                DEFAULT_MAX_EVENTS_PER_MEMBER,
            )?,
            member_fetch_timeout: Duration::from_secs(parse_or(
                "MEMBER_FETCH_TIMEOUT_SECS",
                DEFAULT_MEMBER_FETCH_TIMEOUT_SECS,
            )?),
            subcall_timeout: Duration::from_secs(parse_or(
                "SUBCALL_TIMEOUT_SECS",
                DEFAULT_SUBCALL_TIMEOUT_SECS,
            )?),

            github_tokens: parse_token_list(
                &env::var("GITHUB_TOKENS").map_err(|_| ConfigError::Missing("GITHUB_TOKENS"))?,
            ),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }
}

/// Split a comma-separated token list, dropping blanks.
pub fn parse_token_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read an optional numeric variable, falling back to `default` when unset.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("No GitHub tokens configured")]
    NoCredentials,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("GITHUB_TOKENS", "tok_one, tok_two,,");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("STORE_BACKEND", "memory");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.github_tokens, vec!["tok_one", "tok_two"]);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.port, 8080);
        assert_eq!(config.activity_window, chrono::Duration::hours(36));
        assert_eq!(config.manual_refresh_cooldown, Duration::from_secs(600));
    }

    #[test]
    fn test_parse_token_list_drops_blanks() {
        assert!(parse_token_list(" , ,").is_empty());
        assert_eq!(parse_token_list("a"), vec!["a"]);
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("Firestore".parse(), Ok(StoreBackend::Firestore));
        assert!("redis".parse::<StoreBackend>().is_err());
    }
}
