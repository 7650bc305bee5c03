use super::types::UploadFileResponse;
use crate::ai::RemoteFile;
use crate::models::DEFAULT_GEMINI_BASE_URL;
use crate::{Error, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Lightweight Gemini REST client shared by the content and file clients.
pub struct GeminiHttpClient {
    pub(crate) client: Client,
    pub(crate) api_key: String,
    model: String,
    pub(crate) base_url: String,
    timeout: Duration,
}

impl GeminiHttpClient {
    /// Construct a Gemini client over a shared connection pool.
    ///
    /// `model` should be the bare model ID (for example `gemini-1.5-flash`);
    /// a `models/...` prefix is stripped.
    pub fn new_with_client(
        api_key: String,
        model: String,
        timeout: Duration,
        client: Client,
    ) -> Self {
        let model = model.strip_prefix("models/").unwrap_or(&model).to_string();

        Self {
            client,
            api_key,
            model,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Returns the configured model ID without the `models/` prefix.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn authorized(&self, builder: RequestBuilder, timeout: Duration) -> RequestBuilder {
        builder
            .timeout(timeout)
            .header("x-goog-api-key", &self.api_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!("Failed to send request to Gemini: {}", e);
            e
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Gemini API error (status {}): {}", status, error_text);
            return Err(Error::AiProvider(format!(
                "Gemini API error (status {}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    async fn parse<Resp: DeserializeOwned>(response: Response) -> Result<Resp> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse Gemini response: {}\nBody: {}", e, body);
            Error::AiProvider(format!("Failed to parse Gemini response: {}", e))
        })
    }

    async fn post_to_url<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        url: String,
        request: &Req,
        timeout: Duration,
    ) -> Result<Resp> {
        let builder = self
            .authorized(self.client.post(&url), timeout)
            .header("Content-Type", "application/json")
            .json(request);

        Self::parse(self.send(builder).await?).await
    }

    /// Calls Gemini's `generateContent` endpoint.
    pub async fn generate_content<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        request: &Req,
        timeout: Option<Duration>,
    ) -> Result<Resp> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        self.post_to_url(url, request, timeout.unwrap_or(self.timeout))
            .await
    }

    /// Calls Gemini's `countTokens` endpoint.
    pub async fn count_tokens<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        request: &Req,
    ) -> Result<Resp> {
        let url = format!("{}/v1beta/models/{}:countTokens", self.base_url, self.model);
        self.post_to_url(url, request, self.timeout).await
    }

    /// Sends raw media bytes to the Files API upload endpoint.
    pub async fn upload_file(&self, bytes: Vec<u8>, mime_type: &str) -> Result<RemoteFile> {
        let url = format!("{}/upload/v1beta/files", self.base_url);
        let builder = self
            .authorized(self.client.post(&url), self.timeout)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", mime_type)
            .body(bytes);

        let response: UploadFileResponse = Self::parse(self.send(builder).await?).await?;
        Ok(response.file)
    }

    /// Fetches file metadata; `name` is the `files/...` resource name.
    pub async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        let url = format!("{}/v1beta/{}", self.base_url, name);
        let builder = self.authorized(self.client.get(&url), self.timeout);
        Self::parse(self.send(builder).await?).await
    }

    pub async fn delete_file(&self, name: &str) -> Result<()> {
        let url = format!("{}/v1beta/{}", self.base_url, name);
        let builder = self.authorized(self.client.delete(&url), self.timeout);
        self.send(builder).await?;
        Ok(())
    }
}
