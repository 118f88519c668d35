//! Current-user profile: local cache and save flow.
//!
//! The cache is an injected [`ProfileCache`] rather than a global so the
//! service can be tested in isolation. The client reads it at startup and
//! rewrites it whenever the backend returns an updated profile.

use crate::api::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile API error: {0}")]
    Api(#[from] ApiError),
    #[error("Profile cache error: {0}")]
    Cache(#[from] CacheError),
}

/// The signed-in user as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_trip_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_photo_url: Option<String>,
}

/// Partial profile update. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_trip_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_photo_url: Option<String>,
}

/// Key-value store for the single current-user record.
pub trait ProfileCache: Send + Sync {
    fn get(&self) -> Result<Option<User>, CacheError>;
    fn set(&self, user: &User) -> Result<(), CacheError>;
    fn clear(&self) -> Result<(), CacheError>;
}

#[derive(Debug, Default)]
pub struct MemoryProfileCache {
    user: Mutex<Option<User>>,
}

impl MemoryProfileCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileCache for MemoryProfileCache {
    fn get(&self) -> Result<Option<User>, CacheError> {
        Ok(self.user.lock().unwrap().clone())
    }

    fn set(&self, user: &User) -> Result<(), CacheError> {
        *self.user.lock().unwrap() = Some(user.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        *self.user.lock().unwrap() = None;
        Ok(())
    }
}

/// Stores the user as pretty JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileProfileCache {
    path: PathBuf,
}

impl JsonFileProfileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileCache for JsonFileProfileCache {
    fn get(&self) -> Result<Option<User>, CacheError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn set(&self, user: &User) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(user)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Backend side of the profile flow.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn save_profile(&self, patch: &ProfilePatch) -> Result<User, ApiError>;
}

/// Saves profile changes and keeps the local cache in step.
pub struct ProfileService {
    api: Arc<dyn ProfileApi>,
    cache: Arc<dyn ProfileCache>,
}

impl ProfileService {
    pub fn new(api: Arc<dyn ProfileApi>, cache: Arc<dyn ProfileCache>) -> Self {
        Self { api, cache }
    }

    pub fn current_user(&self) -> Result<Option<User>, ProfileError> {
        Ok(self.cache.get()?)
    }

    pub fn is_logged_in(&self) -> Result<bool, ProfileError> {
        Ok(self.current_user()?.is_some())
    }

    /// Post `patch` and cache the returned user.
    ///
    /// The cache is left untouched when the request fails.
    pub async fn save_profile(&self, patch: &ProfilePatch) -> Result<User, ProfileError> {
        let user = self.api.save_profile(patch).await?;
        self.cache.set(&user)?;
        info!(user = %user.username, "profile saved");
        Ok(user)
    }

    /// Save freshly uploaded media URLs onto the profile.
    pub async fn save_media_urls(
        &self,
        profile_pic_url: Option<String>,
        cover_photo_url: Option<String>,
    ) -> Result<User, ProfileError> {
        let patch = ProfilePatch {
            profile_pic_url,
            cover_photo_url,
            ..ProfilePatch::default()
        };
        self.save_profile(&patch).await
    }

    pub fn sign_out(&self) -> Result<(), ProfileError> {
        debug!("clearing cached user");
        Ok(self.cache.clear()?)
    }
}
