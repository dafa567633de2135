// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GitHub API client.
//!
//! Handles:
//! - Public event feed, profile, repositories and languages (REST)
//! - Push commit detail via the compare endpoint
//! - Pull request / issue counts via GraphQL search
//! - Credential selection per call and rate limit detection
//!
//! A 404 on profile, events or compare means "no data" and is returned
//! as `Ok(None)`, never as an error.

use crate::error::AppError;
use crate::services::credentials::{CredentialPool, Purpose};
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const CLIENT_USER_AGENT: &str = concat!("community-feed/", env!("CARGO_PKG_VERSION"));
const EVENTS_PER_PAGE: &str = "100";
const REPOS_PER_PAGE: &str = "100";

const ISSUE_COUNT_QUERY: &str =
    "query($q: String!) { search(query: $q, type: ISSUE) { issueCount } }";

/// GitHub API client bound to a credential pool.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    graphql_url: String,
    pool: Arc<CredentialPool>,
}

impl GitHubClient {
    pub fn new(base_url: &str, graphql_url: &str, pool: Arc<CredentialPool>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            graphql_url: graphql_url.to_string(),
            pool,
        }
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Get a user profile. `None` if the user does not exist.
    pub async fn get_user(
        &self,
        username: &str,
        purpose: Purpose,
    ) -> Result<Option<GitHubUser>, AppError> {
        let url = format!("{}/users/{}", self.base_url, urlencoding::encode(username));
        self.get_json_optional(&url, &[], purpose).await
    }

    /// Most recent public events of a user. `None` if the user does not exist.
    pub async fn list_public_events(
        &self,
        username: &str,
        purpose: Purpose,
    ) -> Result<Option<Vec<RawEvent>>, AppError> {
        let url = format!(
            "{}/users/{}/events/public",
            self.base_url,
            urlencoding::encode(username)
        );
        self.get_json_optional(&url, &[("per_page", EVENTS_PER_PAGE)], purpose)
            .await
    }

    /// Commits between two SHAs of a repository (`owner/name`).
    pub async fn compare_commits(
        &self,
        repository: &str,
        base: &str,
        head: &str,
        purpose: Purpose,
    ) -> Result<Option<CompareResponse>, AppError> {
        let url = format!(
            "{}/compare/{}...{}",
            self.repo_url(repository)?,
            urlencoding::encode(base),
            urlencoding::encode(head)
        );
        self.get_json_optional(&url, &[], purpose).await
    }

    /// Repositories owned by a user, most recently updated first.
    pub async fn list_repos(
        &self,
        username: &str,
        purpose: Purpose,
    ) -> Result<Vec<GitHubRepo>, AppError> {
        let url = format!(
            "{}/users/{}/repos",
            self.base_url,
            urlencoding::encode(username)
        );
        let repos = self
            .get_json_optional(
                &url,
                &[("per_page", REPOS_PER_PAGE), ("sort", "updated")],
                purpose,
            )
            .await?;
        Ok(repos.unwrap_or_default())
    }

    /// Bytes of code per language for a repository (`owner/name`).
    pub async fn get_repo_languages(
        &self,
        repository: &str,
        purpose: Purpose,
    ) -> Result<HashMap<String, u64>, AppError> {
        let url = format!("{}/languages", self.repo_url(repository)?);
        let languages = self.get_json_optional(&url, &[], purpose).await?;
        Ok(languages.unwrap_or_default())
    }

    /// Number of issues / pull requests matching a search query.
    pub async fn search_issue_count(&self, query: &str, purpose: Purpose) -> Result<u64, AppError> {
        let credential = self.pool.select_for_purpose(purpose);
        self.pool.record_call(credential, 1);

        let body = serde_json::json!({
            "query": ISSUE_COUNT_QUERY,
            "variables": { "q": query }
        });

        let response = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(credential.token())
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::GitHubApi(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(response, purpose).await);
        }

        let parsed: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| AppError::GitHubApi(format!("JSON parse error: {}", e)))?;

        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(AppError::GitHubApi(format!(
                "GraphQL error: {}",
                messages.join("; ")
            )));
        }

        parsed
            .data
            .map(|d| d.search.issue_count)
            .ok_or_else(|| AppError::GitHubApi("GraphQL response without data".to_string()))
    }

    fn repo_url(&self, repository: &str) -> Result<String, AppError> {
        let (owner, name) = repository.split_once('/').ok_or_else(|| {
            AppError::BadRequest(format!("Invalid repository name: {}", repository))
        })?;
        Ok(format!(
            "{}/repos/{}/{}",
            self.base_url,
            urlencoding::encode(owner),
            urlencoding::encode(name)
        ))
    }

    /// GET with the purpose's credential; 404 becomes `Ok(None)`.
    async fn get_json_optional<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        purpose: Purpose,
    ) -> Result<Option<T>, AppError> {
        let credential = self.pool.select_for_purpose(purpose);
        self.pool.record_call(credential, 1);

        let response = self
            .http
            .get(url)
            .bearer_auth(credential.token())
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::GitHubApi(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(status_error(response, purpose).await);
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| AppError::GitHubApi(format!("JSON parse error: {}", e)))
    }
}

/// Map a non-success response to an error, flagging rate limits and bad tokens.
async fn status_error(response: reqwest::Response, purpose: Purpose) -> AppError {
    let status = response.status();
    let exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        tracing::warn!(purpose = %purpose, status = %status, "GitHub rate limit hit");
        return AppError::GitHubApi(AppError::GITHUB_RATE_LIMIT.to_string());
    }

    if status == StatusCode::UNAUTHORIZED {
        tracing::warn!(purpose = %purpose, "GitHub rejected credential");
        return AppError::GitHubApi(AppError::GITHUB_TOKEN_ERROR.to_string());
    }

    AppError::GitHubApi(format!("HTTP {}: {}", status, body))
}

// ─── Response types ──────────────────────────────────────────────────────────

/// User profile.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
}

/// Repository summary from the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub stargazers_count: u64,
}

/// One entry of the public event feed, payload left untyped.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub actor: RawActor,
    pub repo: RawRepo,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawActor {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRepo {
    /// `owner/name`
    pub name: String,
}

/// Compare endpoint response (only the commit list is used).
#[derive(Debug, Clone, Deserialize)]
pub struct CompareResponse {
    #[serde(default)]
    pub commits: Vec<CompareCommit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareCommit {
    pub sha: String,
    pub commit: CompareCommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareCommitDetail {
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlData {
    search: GraphQlSearch,
}

#[derive(Debug, Deserialize)]
struct GraphQlSearch {
    #[serde(rename = "issueCount")]
    issue_count: u64,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}
