//! Profile Store: the one-to-one profile row and its avatar object.
//!
//! The row is created lazily: [`ProfileStore::load`] upserts a default profile
//! (username = email local part) when none exists yet.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde_json::Value;

use crate::backend::{
    file_extension, image_content_type, object_path_from_url, Filter, Row, StorageApi, TableApi,
};
use crate::config::DiaryConfig;
use crate::error::{DiaryError, Result};
use crate::models::{from_row, Identity, Profile, ProfileRow};

#[derive(Clone)]
pub struct ProfileStore<B: TableApi + StorageApi> {
    backend: B,
    table: String,
    avatar_bucket: String,
    current: Arc<RwLock<Option<Profile>>>,
}

impl<B: TableApi + StorageApi> ProfileStore<B> {
    pub fn new(backend: B, config: &DiaryConfig) -> Self {
        Self {
            backend,
            table: config.tables.profiles.clone(),
            avatar_bucket: config.storage.avatars.clone(),
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Last loaded profile.
    pub fn current(&self) -> Option<Profile> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_current(&self, profile: Option<Profile>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = profile;
    }

    pub fn clear(&self) {
        self.set_current(None);
    }

    /// Object path of the cached avatar for `identity`, if any.
    pub fn avatar_path(&self, identity: &Identity) -> Option<String> {
        self.current()
            .filter(|p| p.id == identity.id)
            .and_then(|p| p.avatar_url)
            .and_then(|url| object_path_from_url(&url))
    }

    /// Object path of the avatar recorded on the remote row. Leaves the cache alone.
    pub async fn stored_avatar_path(&self, identity: &Identity) -> Result<Option<String>> {
        let rows = self
            .backend
            .query(&self.table, &Filter::new().eq("id", identity.id.as_str()), None)
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(from_row::<ProfileRow>(row)?
                .avatar_url
                .and_then(|url| object_path_from_url(&url))),
            None => Ok(None),
        }
    }

    /// Fetch the profile row, creating it on first access.
    pub async fn load(&self, identity: &Identity) -> Result<Profile> {
        let rows = self
            .backend
            .query(&self.table, &Filter::new().eq("id", identity.id.as_str()), None)
            .await?;
        let profile = match rows.into_iter().next() {
            Some(row) => from_row::<ProfileRow>(row)?.into_profile(),
            None => {
                tracing::info!(id = %identity.id, "creating profile");
                let mut row = Row::new();
                row.insert("id".into(), identity.id.clone().into());
                row.insert("username".into(), identity.email_local_part().into());
                let stored = self.backend.upsert(&self.table, row).await?;
                from_row::<ProfileRow>(stored)?.into_profile()
            }
        };
        self.set_current(Some(profile.clone()));
        Ok(profile)
    }

    async fn write_columns(&self, identity: &Identity, changes: Row) -> Result<Profile> {
        let affected = self
            .backend
            .update(&self.table, &Filter::new().eq("id", identity.id.as_str()), changes)
            .await?;
        let row = affected
            .into_iter()
            .next()
            .ok_or_else(|| DiaryError::not_found("Profile not found"))?;
        let profile = from_row::<ProfileRow>(row)?.into_profile();
        self.set_current(Some(profile.clone()));
        Ok(profile)
    }

    pub async fn update_username(&self, identity: &Identity, username: &str) -> Result<Profile> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DiaryError::validation("Username is required"));
        }
        let mut changes = Row::new();
        changes.insert("username".into(), username.into());
        self.write_columns(identity, changes).await
    }

    /// Replace the avatar. Removing the previous object is best-effort.
    pub async fn upload_avatar(
        &self,
        identity: &Identity,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Profile> {
        if bytes.is_empty() {
            return Err(DiaryError::validation("Image is empty"));
        }
        if let Some(old) = self.avatar_path(identity) {
            if let Err(e) = self.backend.delete_object(&self.avatar_bucket, &old).await {
                tracing::warn!("Failed to remove previous avatar {}: {}", old, e);
            }
        }

        let ext = file_extension(file_name);
        let path = format!(
            "{}/avatar-{}.{}",
            identity.id,
            Utc::now().timestamp_millis(),
            ext
        );
        let url = self
            .backend
            .upload_object(&self.avatar_bucket, &path, bytes, image_content_type(&ext))
            .await?;

        let mut changes = Row::new();
        changes.insert("avatar_url".into(), url.into());
        self.write_columns(identity, changes).await
    }

    pub async fn remove_avatar(&self, identity: &Identity) -> Result<Profile> {
        let path = self
            .avatar_path(identity)
            .ok_or_else(|| DiaryError::validation("No avatar to remove"))?;
        self.backend.delete_object(&self.avatar_bucket, &path).await?;

        let mut changes = Row::new();
        changes.insert("avatar_url".into(), Value::Null);
        self.write_columns(identity, changes).await
    }
}
