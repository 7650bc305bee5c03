use super::client::GeminiHttpClient;
use super::types::{
    Content, CountTokensRequest, CountTokensResponse, GenerateContentRequest,
    GenerateContentResponse, Part,
};
use crate::ai::{ContentPart, ContentService, GenerateRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Gemini implementation of [`ContentService`].
pub struct GeminiContentClient {
    http: GeminiHttpClient,
}

impl GeminiContentClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(api_key, model, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(
                api_key,
                model,
                Duration::from_secs(120),
                client,
            ),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    /// Concatenates every text part of the first candidate.
    fn extract_text(response: &GenerateContentResponse) -> Option<String> {
        let candidate = response.candidates.first()?;
        let texts: Vec<&str> = candidate
            .content
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::FileData { .. } => None,
            })
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

#[async_trait]
impl ContentService for GeminiContentClient {
    async fn count_tokens(&self, text: &str) -> Result<u32> {
        let request = CountTokensRequest {
            contents: vec![Content::user(&[ContentPart::text(text)])],
        };

        let response: CountTokensResponse = self.http.count_tokens(&request).await?;
        Ok(response.total_tokens)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        tracing::debug!(
            "Sending generateContent with {} parts to {}",
            request.parts.len(),
            self.http.model()
        );

        let body = GenerateContentRequest {
            contents: vec![Content::user(&request.parts)],
            generation_config: request.config.clone(),
        };

        let response: GenerateContentResponse =
            self.http.generate_content(&body, request.timeout).await?;

        Self::extract_text(&response)
            .ok_or_else(|| Error::AiProvider("No text in Gemini response".to_string()))
    }
}
