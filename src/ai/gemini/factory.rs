use super::{GeminiContentClient, GeminiFileClient};
use crate::ai::{ClientFactory, Connection};
use crate::models::{ModelChoice, DEFAULT_GEMINI_BASE_URL};

/// Hands out Gemini clients bound to the caller's key, over one shared
/// connection pool.
#[derive(Clone)]
pub struct GeminiClientFactory {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiClientFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

impl ClientFactory for GeminiClientFactory {
    fn connect(&self, api_key: &str, model: ModelChoice) -> Connection {
        tracing::debug!("Connecting Gemini clients for model {}", model);

        Connection {
            content: Box::new(
                GeminiContentClient::new_with_client(
                    api_key.to_string(),
                    model.id().to_string(),
                    self.client.clone(),
                )
                .with_base_url(self.base_url.clone()),
            ),
            files: Box::new(
                GeminiFileClient::new_with_client(api_key.to_string(), self.client.clone())
                    .with_base_url(self.base_url.clone()),
            ),
        }
    }
}
