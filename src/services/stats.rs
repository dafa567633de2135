// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-demand GitHub statistics for one member.

use crate::db::MemberDirectory;
use crate::error::AppError;
use crate::models::stats::aggregate_languages;
use crate::models::{Member, MemberStats};
use crate::services::credentials::Purpose;
use crate::services::github::{GitHubClient, GitHubRepo};
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Computes `MemberStats` from the GitHub API.
///
/// Language and count sub-calls each run under their own timeout; a slow or
/// failed sub-call contributes nothing instead of failing the whole request.
pub struct MemberStatsService {
    directory: Arc<dyn MemberDirectory>,
    github: GitHubClient,
    subcall_timeout: Duration,
}

impl MemberStatsService {
    pub fn new(
        directory: Arc<dyn MemberDirectory>,
        github: GitHubClient,
        subcall_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            github,
            subcall_timeout,
        }
    }

    /// Stats for a member looked up by directory id.
    pub async fn fetch_stats_for_id(&self, member_id: &str) -> Result<MemberStats, AppError> {
        let member = self
            .directory
            .get_member(member_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member_id)))?;

        self.fetch_member_stats(&member).await
    }

    pub async fn fetch_member_stats(&self, member: &Member) -> Result<MemberStats, AppError> {
        let username = member.username().ok_or_else(|| {
            AppError::NotFound(format!("Member {} has no GitHub account", member.id))
        })?;

        let profile = self
            .github
            .get_user(username, Purpose::Primary)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("GitHub user {} not found", username)))?;

        let repos = self.github.list_repos(username, Purpose::Secondary).await?;
        let owned: Vec<&GitHubRepo> = repos.iter().filter(|r| !r.fork).collect();
        let total_stars: u64 = owned.iter().map(|r| r.stargazers_count).sum();

        let (languages, pull_requests, issues) = tokio::join!(
            self.languages(&owned),
            self.issue_count(format!("author:{} type:pr", username)),
            self.issue_count(format!("author:{} type:issue", username)),
        );

        tracing::debug!(
            member_id = %member.id,
            username,
            repos = owned.len(),
            "Computed member stats"
        );

        Ok(MemberStats {
            member_id: member.id.clone(),
            username: profile.login,
            public_repos: profile.public_repos,
            followers: profile.followers,
            following: profile.following,
            total_stars,
            languages: aggregate_languages(&languages),
            pull_requests,
            issues,
            fetched_at: Utc::now(),
        })
    }

    async fn languages(&self, repos: &[&GitHubRepo]) -> Vec<HashMap<String, u64>> {
        let lookups = repos.iter().map(|repo| async move {
            let call = self
                .github
                .get_repo_languages(&repo.full_name, Purpose::Bulk);
            match tokio::time::timeout(self.subcall_timeout, call).await {
                Ok(Ok(languages)) => Some(languages),
                Ok(Err(e)) => {
                    tracing::debug!(repository = %repo.full_name, error = %e, "Language lookup failed");
                    None
                }
                Err(_) => {
                    tracing::debug!(repository = %repo.full_name, "Language lookup timed out");
                    None
                }
            }
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }

    async fn issue_count(&self, query: String) -> u64 {
        let call = self.github.search_issue_count(&query, Purpose::Background);
        match tokio::time::timeout(self.subcall_timeout, call).await {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                tracing::debug!(query = %query, error = %e, "Issue count failed");
                0
            }
            Err(_) => {
                tracing::debug!(query = %query, "Issue count timed out");
                0
            }
        }
    }
}
