//! Generative-AI service integration
//!
//! Defines the seams the chat pipeline talks through: content generation
//! (token counting and `generateContent`) and the remote file store used for
//! images, video and audio. Gemini implements both; mocks back the tests.

pub mod gemini;
pub mod mime;
pub mod mock;

pub use gemini::{GeminiClientFactory, GeminiContentClient, GeminiFileClient};
pub use mock::{MockClientFactory, MockContentClient, MockFileStore};

use crate::models::{GenerationSettings, ModelChoice};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Processing state reported by the remote file store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    #[default]
    StateUnspecified,
    Processing,
    Active,
    Failed,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::StateUnspecified => "STATE_UNSPECIFIED",
            FileState::Processing => "PROCESSING",
            FileState::Active => "ACTIVE",
            FileState::Failed => "FAILED",
        }
    }
}

/// Handle to a file held by the remote file store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc-123`.
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: FileState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
}

/// One element of the content list sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    File { uri: String, mime_type: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(text.into())
    }

    pub fn file(file: &RemoteFile) -> Self {
        ContentPart::File {
            uri: file.uri.clone(),
            mime_type: file.mime_type.clone(),
        }
    }
}

/// Sampling config as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

impl GenerationConfig {
    pub fn with_response_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.response_mime_type = Some(mime_type.into());
        self
    }
}

impl From<&GenerationSettings> for GenerationConfig {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            temperature: settings.temperature(),
            top_p: settings.top_p(),
            max_output_tokens: settings.max_output_tokens(),
            response_mime_type: None,
        }
    }
}

/// A single `generateContent` call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub parts: Vec<ContentPart>,
    pub config: GenerationConfig,
    /// Overrides the client's default request timeout.
    pub timeout: Option<Duration>,
}

#[async_trait]
pub trait ContentService: Send + Sync {
    async fn count_tokens(&self, text: &str) -> Result<u32>;
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

#[async_trait]
pub trait FileStoreService: Send + Sync {
    async fn upload_file(&self, path: &Path, mime_type: &str) -> Result<RemoteFile>;
    async fn get_file(&self, name: &str) -> Result<RemoteFile>;
    async fn delete_file(&self, name: &str) -> Result<()>;
}

/// Clients bound to one API key and model for the span of a chat request.
pub struct Connection {
    pub content: Box<dyn ContentService>,
    pub files: Box<dyn FileStoreService>,
}

/// Builds per-request clients from the key entered in the configuration panel.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, api_key: &str, model: ModelChoice) -> Connection;
}
