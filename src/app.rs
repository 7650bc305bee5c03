//! Chat pipeline shared by every media kind.
//!
//! configuration → api-key check → stage → (upload → poll) → one inference
//! call → remote cleanup. PDFs are read locally; images, video and audio go
//! through the remote file store.

use crate::ai::mime;
use crate::ai::{
    ClientFactory, Connection, ContentPart, FileStoreService, GenerateRequest, GenerationConfig,
    GeminiClientFactory, RemoteFile,
};
use crate::documents::{concat_pages, PdfTextExtractor, TextExtractor};
use crate::models::{ChatOutcome, ChatRequest, Config, MediaKind, Upload};
use crate::polling::{self, PollPolicy};
use crate::staging::{self, NameLocks, ScratchDir};
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Answers chat requests against a generative model.
pub struct App {
    factory: Box<dyn ClientFactory>,
    extractor: Box<dyn TextExtractor>,
    scratch: ScratchDir,
    staging_dir: PathBuf,
    staging_locks: NameLocks,
    poll: PollPolicy,
    request_timeout: Duration,
    default_api_key: Option<String>,
    shutdown: CancellationToken,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub factory: Box<dyn ClientFactory>,
    pub extractor: Box<dyn TextExtractor>,
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(services: AppServices, config: &Config) -> Result<Self> {
        Ok(Self {
            factory: services.factory,
            extractor: services.extractor,
            scratch: ScratchDir::new()?,
            staging_dir: config.staging_dir.clone(),
            staging_locks: NameLocks::new(),
            poll: config.poll,
            request_timeout: config.request_timeout,
            default_api_key: config.gemini_api_key.clone(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Construct an app talking to Gemini over one shared connection pool.
    pub fn new(config: &Config) -> Result<Self> {
        let factory = GeminiClientFactory::new(reqwest::Client::new())
            .with_base_url(config.gemini_base_url.clone());
        info!("Gemini endpoint: {}", config.gemini_base_url);

        Self::with_services(
            AppServices {
                factory: Box::new(factory),
                extractor: Box::new(PdfTextExtractor::new()),
            },
            config,
        )
    }

    /// Token that aborts in-flight polling when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn api_key<'a>(&'a self, request: &'a ChatRequest) -> Option<&'a str> {
        fn usable(key: &str) -> Option<&str> {
            Some(key.trim()).filter(|key| !key.is_empty())
        }

        request
            .api_key
            .as_deref()
            .and_then(usable)
            .or_else(|| self.default_api_key.as_deref().and_then(usable))
    }

    fn validate(request: &ChatRequest) -> Result<()> {
        if request.uploads.is_empty() {
            return Err(Error::InvalidInput(match request.media {
                MediaKind::Pdf => "Choose one or more PDF files".to_string(),
                kind => format!("Upload your {} file", kind),
            }));
        }

        if !request.media.accepts_multiple_files() {
            if request.uploads.len() > 1 {
                return Err(Error::InvalidInput(format!(
                    "Only one {} file can be sent at a time (got {})",
                    request.media,
                    request.uploads.len()
                )));
            }
            if request.prompt().is_none() {
                return Err(Error::InvalidInput("Enter your prompt".to_string()));
            }
        }

        Ok(())
    }

    /// Run one chat interaction to completion.
    pub async fn run(&self, request: ChatRequest) -> Result<ChatOutcome> {
        let request_id = Uuid::new_v4();

        let Some(api_key) = self.api_key(&request) else {
            warn!("[{}] No API key supplied, nothing to do", request_id);
            return Err(Error::MissingApiKey);
        };

        Self::validate(&request)?;

        info!(
            "[{}] {} request for {} with {} file(s)",
            request_id,
            request.media,
            request.model,
            request.uploads.len()
        );

        let connection = self.factory.connect(api_key, request.model);

        let mut outcome = ChatOutcome {
            request_id,
            media: request.media,
            model: request.model,
            token_count: None,
            text: None,
            deleted_file: None,
        };

        if request.media.uses_remote_upload() {
            self.chat_with_media(&connection, &request, &mut outcome).await?;
        } else {
            self.chat_with_documents(&connection, &request, &mut outcome).await?;
        }

        info!("[{}] Request complete", request_id);
        Ok(outcome)
    }

    async fn extract_documents(&self, request_id: Uuid, uploads: &[Upload]) -> Result<String> {
        let _guard = self.scratch.lock().await;

        let removed = staging::clear_files(self.scratch.path()).await;
        if removed > 0 {
            info!("[{}] Cleared {} stale scratch file(s)", request_id, removed);
        }

        let mut documents = Vec::with_capacity(uploads.len());
        for (index, upload) in uploads.iter().enumerate() {
            let file_name = format!(
                "{:03}-{}",
                index,
                staging::sanitize_file_name(&upload.file_name)?
            );
            let path = staging::write_file(self.scratch.path(), &file_name, &upload.bytes).await?;
            let pages = self.extractor.page_texts(&path).await?;
            info!(
                "[{}] Extracted {} page(s) from {}",
                request_id,
                pages.len(),
                upload.file_name
            );
            documents.push(pages);
        }

        Ok(concat_pages(documents))
    }

    async fn chat_with_documents(
        &self,
        connection: &Connection,
        request: &ChatRequest,
        outcome: &mut ChatOutcome,
    ) -> Result<()> {
        let text = self
            .extract_documents(outcome.request_id, &request.uploads)
            .await?;

        let token_count = connection.content.count_tokens(&text).await?;
        info!(
            "[{}] Extracted text: {} chars, {} tokens",
            outcome.request_id,
            text.len(),
            token_count
        );
        outcome.token_count = Some(token_count);

        let Some(question) = request.prompt() else {
            return Ok(());
        };

        let generate = GenerateRequest {
            parts: vec![ContentPart::text(question), ContentPart::text(text)],
            config: GenerationConfig::from(&request.settings)
                .with_response_mime_type("text/plain"),
            timeout: Some(self.request_timeout),
        };

        outcome.text = Some(connection.content.generate(&generate).await?);
        Ok(())
    }

    async fn chat_with_media(
        &self,
        connection: &Connection,
        request: &ChatRequest,
        outcome: &mut ChatOutcome,
    ) -> Result<()> {
        let request_id = outcome.request_id;
        let (Some(upload), Some(prompt)) = (request.uploads.first(), request.prompt()) else {
            return Err(Error::Invariant(
                "media request passed validation without a file and prompt".to_string(),
            ));
        };

        let mime_type = mime::detect_mime(&upload.bytes, &upload.file_name, request.media);
        let file_name = staging::sanitize_file_name(&upload.file_name)?;
        let staging_guard = self.staging_locks.lock(&file_name).await;
        let staged = staging::write_file(&self.staging_dir, &file_name, &upload.bytes).await?;
        let uploaded = connection.files.upload_file(&staged, mime_type).await;
        staging::discard(&staged).await;
        drop(staging_guard);
        let remote = uploaded?;
        info!(
            "[{}] Uploaded {} as {} ({})",
            request_id, upload.file_name, remote.name, mime_type
        );

        let ready = match polling::wait_until_ready(
            connection.files.as_ref(),
            remote.clone(),
            &self.poll,
            &self.shutdown,
        )
        .await
        {
            Ok(file) => file,
            Err(Error::ProcessingFailed(state)) => {
                error!("[{}] {} failed processing: {}", request_id, remote.name, state);
                return Err(Error::ProcessingFailed(state));
            }
            Err(e) => {
                Self::discard_remote(connection.files.as_ref(), &remote).await;
                return Err(e);
            }
        };

        let generate = GenerateRequest {
            parts: vec![ContentPart::file(&ready), ContentPart::text(prompt)],
            config: GenerationConfig::from(&request.settings),
            timeout: Some(self.request_timeout),
        };

        let text = match connection.content.generate(&generate).await {
            Ok(text) => text,
            Err(e) => {
                Self::discard_remote(connection.files.as_ref(), &ready).await;
                return Err(e);
            }
        };
        outcome.text = Some(text);

        match connection.files.delete_file(&ready.name).await {
            Ok(()) => {
                info!("[{}] Deleted remote file {}", request_id, ready.uri);
                outcome.deleted_file = Some(ready.name);
            }
            Err(e) => warn!(
                "[{}] Answer produced but {} could not be deleted: {}",
                request_id, ready.name, e
            ),
        }

        Ok(())
    }

    async fn discard_remote(files: &dyn FileStoreService, file: &RemoteFile) {
        match files.delete_file(&file.name).await {
            Ok(()) => info!("Deleted remote file {} after an aborted request", file.uri),
            Err(e) => warn!("Failed to delete remote file {}: {}", file.name, e),
        }
    }
}
