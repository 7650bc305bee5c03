//! Gemini Files API client.
//!
//! Media is uploaded once, referenced by URI in `generateContent`, and
//! deleted when the answer has been produced.

use super::client::GeminiHttpClient;
use crate::ai::{FileStoreService, RemoteFile};
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Gemini implementation of [`FileStoreService`].
pub struct GeminiFileClient {
    http: GeminiHttpClient,
}

impl GeminiFileClient {
    pub fn new(api_key: String) -> Self {
        Self::new_with_client(api_key, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, client: reqwest::Client) -> Self {
        Self {
            // Large videos take a while to push through the upload endpoint.
            http: GeminiHttpClient::new_with_client(
                api_key,
                String::new(),
                Duration::from_secs(600),
                client,
            ),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }
}

#[async_trait]
impl FileStoreService for GeminiFileClient {
    async fn upload_file(&self, path: &Path, mime_type: &str) -> Result<RemoteFile> {
        let bytes = tokio::fs::read(path).await?;
        tracing::debug!(
            "Uploading {} ({} bytes, {}) to Gemini Files API",
            path.display(),
            bytes.len(),
            mime_type
        );

        self.http.upload_file(bytes, mime_type).await
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        self.http.get_file(name).await
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        self.http.delete_file(name).await
    }
}
