//! Chat with documents and media through the Gemini API
//!
//! Accepts PDFs, images, videos and audio clips together with a prompt,
//! forwards them to a hosted Gemini model and returns the text it produces.

pub mod ai;
pub mod app;
pub mod documents;
pub mod error;
pub mod models;
pub mod polling;
pub mod server;
pub mod staging;

pub use error::{Error, Result};
