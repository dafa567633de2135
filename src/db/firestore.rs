// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides:
//! - Member directory reads (`users`)
//! - The merged feed entry (`activity_cache/feed`)
//! - Per-requester manual refresh cooldowns (`refresh_cooldowns`)

use super::{collections, CacheStore, MemberDirectory};
use crate::error::AppError;
use crate::models::{ActivityCacheEntry, Member, RefreshCooldownEntry};
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any token; skip local credential discovery.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Create or update a member record.
    ///
    /// The directory is owned by another system; this exists for seeding
    /// the emulator.
    pub async fn upsert_member(&self, member: &Member) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&member.id)
            .object(member)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

/// Any failure reading the directory aborts a refresh.
fn directory_error(err: impl std::fmt::Display) -> AppError {
    AppError::DirectoryUnavailable(err.to_string())
}

#[async_trait]
impl MemberDirectory for FirestoreDb {
    async fn list_members_with_external_username(&self) -> Result<Vec<Member>, AppError> {
        let members: Vec<Member> = self
            .get_client()
            .map_err(directory_error)?
            .fluent()
            .select()
            .from(collections::USERS)
            .order_by([("id", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(directory_error)?;

        Ok(members.into_iter().filter(Member::is_fetchable).collect())
    }

    async fn get_member(&self, id: &str) -> Result<Option<Member>, AppError> {
        self.get_client()
            .map_err(directory_error)?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(directory_error)
    }
}

#[async_trait]
impl CacheStore for FirestoreDb {
    async fn get_feed(&self) -> Result<Option<ActivityCacheEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITY_CACHE)
            .obj()
            .one(collections::FEED_DOC_ID)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_feed(&self, entry: &ActivityCacheEntry) -> Result<(), AppError> {
        // Single-document write: readers see the old or the new entry.
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITY_CACHE)
            .document_id(collections::FEED_DOC_ID)
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_feed(&self) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ACTIVITY_CACHE)
            .document_id(collections::FEED_DOC_ID)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_cooldown(
        &self,
        requester_id: &str,
    ) -> Result<Option<RefreshCooldownEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REFRESH_COOLDOWNS)
            .obj()
            .one(requester_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_cooldown(&self, entry: &RefreshCooldownEntry) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::REFRESH_COOLDOWNS)
            .document_id(&entry.requester_id)
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_cooldown(&self, requester_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::REFRESH_COOLDOWNS)
            .document_id(requester_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
