use super::{
    ClientFactory, Connection, ContentService, FileState, FileStoreService, GenerateRequest,
    RemoteFile,
};
use crate::models::ModelChoice;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockContentClient {
    responses: Arc<Mutex<Vec<String>>>,
    token_count: u32,
    fail_generate: Option<String>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
    counted: Arc<Mutex<Vec<String>>>,
}

impl MockContentClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            token_count: 42,
            fail_generate: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            counted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, response: String) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    pub fn with_token_count(mut self, token_count: u32) -> Self {
        self.token_count = token_count;
        self
    }

    pub fn with_generate_failure(mut self, message: String) -> Self {
        self.fail_generate = Some(message);
        self
    }

    pub fn get_generate_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn get_requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn get_counted_texts(&self) -> Vec<String> {
        self.counted.lock().unwrap().clone()
    }
}

impl Default for MockContentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentService for MockContentClient {
    async fn count_tokens(&self, text: &str) -> Result<u32> {
        self.counted.lock().unwrap().push(text.to_string());
        Ok(self.token_count)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());

        if let Some(message) = &self.fail_generate {
            return Err(Error::AiProvider(message.clone()));
        }

        let responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(format!("Mock answer #{}", requests.len()))
        } else {
            let index = (requests.len() - 1) % responses.len();
            Ok(responses[index].clone())
        }
    }
}

/// In-memory file store. Uploaded files walk through the configured state
/// sequence, one step per upload/get call, repeating the last state.
#[derive(Clone)]
pub struct MockFileStore {
    states: Arc<Mutex<VecDeque<FileState>>>,
    uploads: Arc<Mutex<Vec<(String, String)>>>,
    get_count: Arc<Mutex<usize>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

impl MockFileStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(Mutex::new(VecDeque::from([FileState::Active]))),
            uploads: Arc::new(Mutex::new(Vec::new())),
            get_count: Arc::new(Mutex::new(0)),
            deleted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_states(self, states: Vec<FileState>) -> Self {
        *self.states.lock().unwrap() = states.into();
        self
    }

    /// `(file name, mime type)` for every upload, in order.
    pub fn get_uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn get_upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn get_poll_count(&self) -> usize {
        *self.get_count.lock().unwrap()
    }

    pub fn get_deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn next_state(&self) -> FileState {
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            states.pop_front().unwrap_or(FileState::Active)
        } else {
            states.front().copied().unwrap_or(FileState::Active)
        }
    }

    fn remote_file(&self, index: usize, mime_type: &str) -> RemoteFile {
        RemoteFile {
            name: format!("files/mock-{}", index),
            uri: format!("https://mock-files.example.com/v1beta/files/mock-{}", index),
            mime_type: mime_type.to_string(),
            display_name: None,
            state: self.next_state(),
            size_bytes: None,
            create_time: None,
            expiration_time: None,
        }
    }
}

impl Default for MockFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStoreService for MockFileStore {
    async fn upload_file(&self, path: &Path, mime_type: &str) -> Result<RemoteFile> {
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Mock upload source missing: {}", path.display()),
            )));
        }

        let index = {
            let mut uploads = self.uploads.lock().unwrap();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            uploads.push((file_name, mime_type.to_string()));
            uploads.len()
        };

        Ok(self.remote_file(index, mime_type))
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        *self.get_count.lock().unwrap() += 1;

        let (index, mime_type) = {
            let uploads = self.uploads.lock().unwrap();
            let index = name
                .strip_prefix("files/mock-")
                .and_then(|i| i.parse::<usize>().ok())
                .filter(|i| *i >= 1 && *i <= uploads.len())
                .ok_or_else(|| Error::AiProvider(format!("File not found: {}", name)))?;
            (index, uploads[index - 1].1.clone())
        };

        Ok(self.remote_file(index, &mime_type))
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// Hands out clones of the same mocks and records which keys connected.
#[derive(Clone)]
pub struct MockClientFactory {
    content: MockContentClient,
    files: MockFileStore,
    connections: Arc<Mutex<Vec<(String, ModelChoice)>>>,
}

impl MockClientFactory {
    pub fn new(content: MockContentClient, files: MockFileStore) -> Self {
        Self {
            content,
            files,
            connections: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn get_connections(&self) -> Vec<(String, ModelChoice)> {
        self.connections.lock().unwrap().clone()
    }
}

impl Default for MockClientFactory {
    fn default() -> Self {
        Self::new(MockContentClient::new(), MockFileStore::new())
    }
}

impl ClientFactory for MockClientFactory {
    fn connect(&self, api_key: &str, model: ModelChoice) -> Connection {
        self.connections
            .lock()
            .unwrap()
            .push((api_key.to_string(), model));

        Connection {
            content: Box::new(self.content.clone()),
            files: Box::new(self.files.clone()),
        }
    }
}
