//! Data models and structures
//!
//! Defines the configuration panel (media kind, model, sampling sliders),
//! the per-request chat payloads, and the environment-backed service config.

use crate::polling::{Backoff, PollPolicy};
use crate::{Error, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// The four mutually exclusive media categories a chat request can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Pdf,
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Pdf,
        MediaKind::Image,
        MediaKind::Video,
        MediaKind::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Pdf => "pdf",
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Human-facing label shown by the media selector.
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Pdf => "PDF files",
            MediaKind::Image => "Images",
            MediaKind::Video => "Video, mp4 file",
            MediaKind::Audio => "Audio files",
        }
    }

    /// PDFs are read locally; every other kind goes through the remote file store.
    pub fn uses_remote_upload(&self) -> bool {
        !matches!(self, MediaKind::Pdf)
    }

    pub fn accepts_multiple_files(&self) -> bool {
        matches!(self, MediaKind::Pdf)
    }

    /// MIME type assumed when neither the bytes nor the file name give it away.
    pub fn default_mime(&self) -> &'static str {
        match self {
            MediaKind::Pdf => "application/pdf",
            MediaKind::Image => "image/png",
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/mpeg",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MediaKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown media kind '{}'", s)))
    }
}

/// Models offered by the configuration panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ModelChoice {
    #[default]
    #[serde(rename = "gemini-1.5-flash")]
    #[value(name = "gemini-1.5-flash")]
    Gemini15Flash,
    #[serde(rename = "gemini-1.5-pro")]
    #[value(name = "gemini-1.5-pro")]
    Gemini15Pro,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 2] = [ModelChoice::Gemini15Flash, ModelChoice::Gemini15Pro];

    pub fn id(&self) -> &'static str {
        match self {
            ModelChoice::Gemini15Flash => "gemini-1.5-flash",
            ModelChoice::Gemini15Pro => "gemini-1.5-pro",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("models/").unwrap_or(s);
        ModelChoice::ALL
            .into_iter()
            .find(|model| model.id() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown model '{}'", s)))
    }
}

/// Bounds, default and step of one slider in the configuration panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SliderRange<T> {
    pub min: T,
    pub max: T,
    pub default: T,
    pub step: T,
}

impl SliderRange<f32> {
    /// Pin a value into range; NaN and infinities fall back to the default.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }
}

impl SliderRange<u32> {
    pub fn clamp(&self, value: u32) -> u32 {
        value.clamp(self.min, self.max)
    }
}

pub const TEMPERATURE: SliderRange<f32> = SliderRange {
    min: 0.0,
    max: 2.0,
    default: 1.0,
    step: 0.25,
};

pub const TOP_P: SliderRange<f32> = SliderRange {
    min: 0.0,
    max: 1.0,
    default: 0.94,
    step: 0.01,
};

pub const MAX_OUTPUT_TOKENS: SliderRange<u32> = SliderRange {
    min: 100,
    max: 5000,
    default: 2000,
    step: 100,
};

/// Sampling parameters taken from the sliders.
///
/// Fields are private so a value outside the slider ranges cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationSettings {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

impl GenerationSettings {
    pub fn new(temperature: f32, top_p: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature: TEMPERATURE.clamp(temperature),
            top_p: TOP_P.clamp(top_p),
            max_output_tokens: MAX_OUTPUT_TOKENS.clamp(max_output_tokens),
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::new(TEMPERATURE.default, TOP_P.default, MAX_OUTPUT_TOKENS.default)
    }
}

/// A file handed over by the user, before it touches local or remote storage.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Everything one chat interaction needs, as collected from the panel.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub api_key: Option<String>,
    pub media: MediaKind,
    pub model: ModelChoice,
    pub settings: GenerationSettings,
    pub prompt: Option<String>,
    pub uploads: Vec<Upload>,
}

impl ChatRequest {
    pub fn new(media: MediaKind) -> Self {
        Self {
            api_key: None,
            media,
            model: ModelChoice::default(),
            settings: GenerationSettings::default(),
            prompt: None,
            uploads: Vec::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: ModelChoice) -> Self {
        self.model = model;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_upload(mut self, upload: Upload) -> Self {
        self.uploads.push(upload);
        self
    }

    /// The prompt, unless it is missing or only whitespace.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// What a chat interaction produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub request_id: Uuid,
    pub media: MediaKind,
    pub model: ModelChoice,
    /// Token count of the extracted PDF text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Remote file name removed from the file store after answering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_file: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaOption {
    pub value: MediaKind,
    pub label: &'static str,
    pub multiple: bool,
}

/// Description of the configuration panel, served to the chat page.
#[derive(Debug, Clone, Serialize)]
pub struct PanelOptions {
    pub media: Vec<MediaOption>,
    pub models: Vec<&'static str>,
    pub default_model: &'static str,
    pub temperature: SliderRange<f32>,
    pub top_p: SliderRange<f32>,
    pub max_output_tokens: SliderRange<u32>,
}

impl PanelOptions {
    pub fn describe() -> Self {
        Self {
            media: MediaKind::ALL
                .into_iter()
                .map(|kind| MediaOption {
                    value: kind,
                    label: kind.label(),
                    multiple: kind.accepts_multiple_files(),
                })
                .collect(),
            models: ModelChoice::ALL.iter().map(|m| m.id()).collect(),
            default_model: ModelChoice::default().id(),
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Used when a request does not carry its own key.
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub bind_addr: String,
    pub staging_dir: PathBuf,
    pub poll: PollPolicy,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
}

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            bind_addr: "127.0.0.1:8501".to_string(),
            staging_dir: std::env::temp_dir(),
            poll: PollPolicy::default(),
            request_timeout: Duration::from_secs(600),
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backoff = match get("POLL_BACKOFF") {
            Some(v) => v.parse::<Backoff>()?,
            None => defaults.poll.backoff,
        };

        let poll = PollPolicy {
            interval: secs_or(
                get("POLL_INTERVAL_SECS"),
                "POLL_INTERVAL_SECS",
                defaults.poll.interval,
            )?,
            max_interval: secs_or(
                get("POLL_MAX_INTERVAL_SECS"),
                "POLL_MAX_INTERVAL_SECS",
                defaults.poll.max_interval,
            )?,
            backoff,
            max_wait: secs_or(
                get("POLL_MAX_WAIT_SECS"),
                "POLL_MAX_WAIT_SECS",
                defaults.poll.max_wait,
            )?,
        };

        let max_upload_bytes = match get("MAX_UPLOAD_MB") {
            Some(v) => parse_num::<usize>(&v, "MAX_UPLOAD_MB")?
                .checked_mul(1024 * 1024)
                .ok_or_else(|| Error::Config(format!("MAX_UPLOAD_MB is too large: {}", v)))?,
            None => defaults.max_upload_bytes,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_base_url: get("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_base_url),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            staging_dir: get("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            poll,
            request_timeout: secs_or(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout,
            )?,
            max_upload_bytes,
        })
    }
}

fn parse_num<T: FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| {
            Error::Config(format!(
                "{} must be a non-negative integer, got '{}'",
                key, value
            ))
        })
}

fn secs_or(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match value {
        Some(v) => Ok(Duration::from_secs(parse_num(&v, key)?)),
        None => Ok(default),
    }
}
