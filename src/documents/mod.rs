//! Document text extraction
//!
//! Pulls per-page text out of staged PDF files. The chat pipeline joins the
//! pages of every uploaded document into one string.

pub mod mock;
pub mod pdf;

pub use mock::MockTextExtractor;
pub use pdf::PdfTextExtractor;

use crate::Result;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Text of each page, in page order.
    async fn page_texts(&self, path: &Path) -> Result<Vec<String>>;
}

/// Append every page of every document, in order, with no separators.
pub fn concat_pages<I>(documents: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    documents.into_iter().flatten().collect()
}
