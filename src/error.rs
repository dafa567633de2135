// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Member directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Manual refresh rate limited, retry in {remaining_secs}s")]
    RateLimited { remaining_secs: u64 },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message carried by `GitHubApi` when the credential's rate limit is exhausted.
    pub const GITHUB_RATE_LIMIT: &'static str = "GitHub rate limit exceeded";
    /// Message carried by `GitHubApi` when the credential was rejected.
    pub const GITHUB_TOKEN_ERROR: &'static str = "GitHub token rejected";

    /// True if this is an upstream rate-limit rejection.
    pub fn is_github_rate_limit(&self) -> bool {
        matches!(self, AppError::GitHubApi(msg) if msg == Self::GITHUB_RATE_LIMIT)
    }

    /// True if the upstream rejected the credential itself.
    pub fn is_github_token_error(&self) -> bool {
        matches!(self, AppError::GitHubApi(msg) if msg == Self::GITHUB_TOKEN_ERROR)
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Body returned when a manual refresh is denied by the cooldown.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitedResponse {
    error: &'static str,
    message: String,
    remaining_time: u64,
    rate_limited: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::RateLimited { remaining_secs } => {
                let body = RateLimitedResponse {
                    error: "rate_limited",
                    message: format!(
                        "Please wait {} seconds before refreshing again",
                        remaining_secs
                    ),
                    remaining_time: *remaining_secs,
                    rate_limited: true,
                };
                return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::GitHubApi(msg) => {
                (StatusCode::BAD_GATEWAY, "github_error", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::DirectoryUnavailable(msg) => {
                tracing::error!(error = %msg, "Member directory unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "directory_unavailable",
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
