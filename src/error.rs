//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Please enter your Google API key to proceed")]
    MissingApiKey,

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Remote file processing ended in state {0}")]
    ProcessingFailed(String),

    #[error("Remote file {name} still processing after {waited_secs}s")]
    ProcessingTimeout { name: String, waited_secs: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("PDF extraction error: {0}")]
    Pdf(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
