//! HTTP surface: the chat page plus a small JSON/multipart API.

use crate::app::App;
use crate::models::{
    ChatOutcome, ChatRequest, GenerationSettings, MediaKind, ModelChoice, PanelOptions, Upload,
    MAX_OUTPUT_TOKENS, TEMPERATURE, TOP_P,
};
use crate::{Error, Result};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const INDEX_HTML: &str = include_str!("../static/index.html");

pub fn router(app: Arc<App>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/options", get(options))
        .route("/api/chat", post(chat))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(app)
}

/// Serve until the app's shutdown token is cancelled.
pub async fn serve(app: Arc<App>, bind_addr: &str, max_upload_bytes: usize) -> Result<()> {
    let shutdown = app.shutdown_token();
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(app, max_upload_bytes))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> &'static str {
    "ok"
}

async fn options() -> Json<PanelOptions> {
    Json(PanelOptions::describe())
}

async fn chat(
    State(app): State<Arc<App>>,
    multipart: Multipart,
) -> std::result::Result<Json<ChatOutcome>, ApiError> {
    let request = read_chat_form(multipart).await?;
    Ok(Json(app.run(request).await?))
}

/// Raw panel values as they arrive in the multipart body.
#[derive(Debug, Default)]
struct ChatForm {
    media: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<String>,
    top_p: Option<String>,
    max_tokens: Option<String>,
    prompt: Option<String>,
    uploads: Vec<Upload>,
}

fn bad_multipart(e: MultipartError) -> Error {
    Error::InvalidInput(format!("Malformed form data: {}", e.body_text()))
}

async fn read_chat_form(mut multipart: Multipart) -> Result<ChatRequest> {
    let mut form = ChatForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" || name == "files" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            // Browsers send an empty, nameless part when no file was picked.
            if file_name.is_empty() {
                continue;
            }
            form.uploads.push(Upload::new(file_name, bytes.to_vec()));
            continue;
        }

        let value = field.text().await.map_err(bad_multipart)?;
        match name.as_str() {
            "media" => form.media = Some(value),
            "api_key" => form.api_key = Some(value),
            "model" => form.model = Some(value),
            "temperature" => form.temperature = Some(value),
            "top_p" => form.top_p = Some(value),
            "max_tokens" => form.max_tokens = Some(value),
            "prompt" => form.prompt = Some(value),
            other => debug!("Ignoring unknown form field '{}'", other),
        }
    }

    form.into_request()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_field<T: FromStr>(value: Option<String>, field: &str, default: T) -> Result<T> {
    match non_empty(value) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("{} must be a number, got '{}'", field, v))),
        None => Ok(default),
    }
}

impl ChatForm {
    fn into_request(self) -> Result<ChatRequest> {
        let media: MediaKind = non_empty(self.media)
            .ok_or_else(|| Error::InvalidInput("Select a media type".to_string()))?
            .parse()?;
        let model = match non_empty(self.model) {
            Some(m) => m.parse()?,
            None => ModelChoice::default(),
        };
        let settings = GenerationSettings::new(
            parse_field(self.temperature, "temperature", TEMPERATURE.default)?,
            parse_field(self.top_p, "top_p", TOP_P.default)?,
            parse_field(self.max_tokens, "max_tokens", MAX_OUTPUT_TOKENS.default)?,
        );

        Ok(ChatRequest {
            api_key: non_empty(self.api_key),
            media,
            model,
            settings,
            prompt: non_empty(self.prompt),
            uploads: self.uploads,
        })
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    error: String,
}

/// Maps library errors onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            Error::MissingApiKey => (StatusCode::BAD_REQUEST, "missing_api_key"),
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            Error::Pdf(_) => (StatusCode::UNPROCESSABLE_ENTITY, "pdf"),
            Error::ProcessingFailed(_) => (StatusCode::BAD_GATEWAY, "processing_failed"),
            Error::AiProvider(_) | Error::Http(_) => (StatusCode::BAD_GATEWAY, "ai_provider"),
            Error::ProcessingTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "processing_timeout"),
            Error::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            error!("Chat request failed ({}): {}", status, self.0);
        } else {
            warn!("Chat request rejected ({}): {}", status, self.0);
        }

        let body = ErrorBody {
            kind,
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
