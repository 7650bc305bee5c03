use super::TextExtractor;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Returns canned page lists, one per call, in order.
#[derive(Clone)]
pub struct MockTextExtractor {
    documents: Arc<Mutex<Vec<Vec<String>>>>,
    seen: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockTextExtractor {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(Mutex::new(Vec::new())),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_document(self, pages: Vec<&str>) -> Self {
        self.documents
            .lock()
            .unwrap()
            .push(pages.into_iter().map(str::to_string).collect());
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Paths handed to the extractor, in call order.
    pub fn get_seen_paths(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl Default for MockTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for MockTextExtractor {
    async fn page_texts(&self, path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Err(Error::Pdf(format!("Mock document missing: {}", path.display())));
        }

        let mut seen = self.seen.lock().unwrap();
        seen.push(path.to_path_buf());

        let documents = self.documents.lock().unwrap();
        Ok(documents.get(seen.len() - 1).cloned().unwrap_or_default())
    }
}
