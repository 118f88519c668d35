//! HTTP client for the backend API.
//!
//! Two endpoints are used by the client:
//!
//! | Endpoint | Body | Response |
//! |---|---|---|
//! | `POST /media/upload` | multipart: `file` (binary), `context` (tag) | `{ "data": { "url": … } }` |
//! | `POST /user/profile` | JSON partial user | `{ "data": User }` |
//!
//! Any non-2xx status is surfaced as an [`ApiError`]. Callers decide whether
//! to retry; the client never mutates slot state.

use crate::config::ApiConfig;
use crate::profile::{ProfileApi, ProfilePatch, User};
use crate::types::ProcessedArtifact;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const MEDIA_UPLOAD_PATH: &str = "/media/upload";
pub const USER_PROFILE_PATH: &str = "/user/profile";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Server rejected request ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Upload failures are API failures on the media endpoint.
pub type UploadError = ApiError;

/// Response envelope used by every endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
struct UploadImageResponse {
    url: String,
}

/// Sends a processed artifact to storage and returns its remote URL.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(
        &self,
        artifact: &ProcessedArtifact,
        context: Option<&str>,
    ) -> Result<String, UploadError>;
}

/// HTTP client for the backend API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return match status {
                StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
                _ => Err(ApiError::Rejected { status, body }),
            };
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Upload an artifact as multipart form data.
    pub async fn upload_image(
        &self,
        artifact: &ProcessedArtifact,
        context: Option<&str>,
    ) -> Result<String, ApiError> {
        let part = Part::bytes(artifact.bytes().to_vec())
            .file_name(artifact.filename().to_string())
            .mime_str(artifact.mime())?;
        let mut form = Form::new().part("file", part);
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            form = form.text("context", context.to_string());
        }

        info!(
            filename = artifact.filename(),
            size = artifact.size(),
            context = context.unwrap_or("-"),
            "uploading image"
        );
        let request = self
            .authorize(self.client.post(self.url(MEDIA_UPLOAD_PATH)))
            .multipart(form);
        let response = request.send().await?;
        let body: ApiResponse<UploadImageResponse> = Self::handle_response(response).await?;
        debug!(url = %body.data.url, "image stored");
        Ok(body.data.url)
    }

    /// Create or update the current user's profile.
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<User, ApiError> {
        let request = self
            .authorize(self.client.post(self.url(USER_PROFILE_PATH)))
            .json(patch);
        let response = request.send().await?;
        let body: ApiResponse<User> = Self::handle_response(response).await?;
        Ok(body.data)
    }
}

#[async_trait]
impl MediaUploader for ApiClient {
    async fn upload(
        &self,
        artifact: &ProcessedArtifact,
        context: Option<&str>,
    ) -> Result<String, UploadError> {
        self.upload_image(artifact, context).await
    }
}

#[async_trait]
impl ProfileApi for ApiClient {
    async fn save_profile(&self, patch: &ProfilePatch) -> Result<User, ApiError> {
        self.update_profile(patch).await
    }
}
