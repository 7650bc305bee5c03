//! Local staging of uploaded files
//!
//! Media uploads are written under the staging directory keyed by their
//! original file name before being forwarded to the remote file store. A
//! per-name lock keeps concurrent uploads of the same name apart. PDFs
//! are staged in a process-wide scratch directory that is emptied before
//! every extraction pass.

use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, warn};

/// Reduce a client-supplied name to a bare file name.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(Error::InvalidInput(format!(
            "Unusable upload file name '{}'",
            name
        )));
    }
    Ok(base.to_string())
}

/// Write `bytes` to `dir/file_name`, replacing any file of the same name.
pub async fn write_file(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    debug!("Staged {} bytes at {}", bytes.len(), path.display());
    Ok(path)
}

/// Best-effort removal of a staged file.
pub async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove staged file {}: {}", path.display(), e);
    }
}

/// Delete every regular file directly inside `dir`.
///
/// Errors are logged and skipped. Returns how many files were removed.
pub async fn clear_files(dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("An error occurred while deleting files in {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("An error occurred while deleting files in {}: {}", dir.display(), e);
                break;
            }
        };

        let path = entry.path();
        match entry.file_type().await {
            Ok(file_type) if file_type.is_file() => match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
            },
            Ok(_) => {}
            Err(e) => warn!("Failed to inspect {}: {}", path.display(), e),
        }
    }

    removed
}

/// One async lock per staged file name.
///
/// Hold the guard from staging until the staged copy is discarded.
#[derive(Debug, Default)]
pub struct NameLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, file_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Entries only the map refers to are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(file_name.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(locks) => locks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Shared scratch directory for PDF staging. Lives as long as the process.
pub struct ScratchDir {
    dir: TempDir,
    lock: Mutex<()>,
}

impl ScratchDir {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("media-chat-scratch-")
            .tempdir()?;
        debug!("Created scratch directory {}", dir.path().display());

        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Exclusive use of the directory for one extraction pass.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_file_name(r"C:\Users\me\clip.mp4").unwrap(), "clip.mp4");
    }

    #[test]
    fn test_sanitize_rejects_empty_names() {
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("uploads/").is_err());
        assert!(sanitize_file_name("..").is_err());
    }

    #[tokio::test]
    async fn test_write_file_overwrites_same_name() {
        let dir = tempfile::tempdir().unwrap();

        let first = write_file(dir.path(), "photo.jpg", b"one").await.unwrap();
        let second = write_file(dir.path(), "photo.jpg", b"two").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_clear_files_removes_only_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"a").unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(clear_files(dir.path()).await, 2);
        assert!(!dir.path().join("a.pdf").exists());
        assert!(dir.path().join("nested").is_dir());
    }

    #[tokio::test]
    async fn test_clear_missing_directory_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(clear_files(&dir.path().join("missing")).await, 0);
    }

    #[tokio::test]
    async fn test_discard_missing_file_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        discard(&dir.path().join("never-staged.mp4")).await;
    }

    #[tokio::test]
    async fn test_name_locks_serialize_only_the_same_name() {
        let locks = NameLocks::new();
        let held = locks.lock("photo.jpg").await;

        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock("clip.mp4")).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock("photo.jpg")).await;
        assert!(same.is_err());

        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.lock("photo.jpg")).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_name_locks_forget_idle_names() {
        let locks = NameLocks::new();
        drop(locks.lock("a.jpg").await);
        drop(locks.lock("b.jpg").await);

        let _held = locks.lock("c.jpg").await;
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_scratch_dir_exists_until_dropped() {
        let scratch = ScratchDir::new().unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());

        {
            let _guard = scratch.lock().await;
            write_file(&path, "doc.pdf", b"%PDF").await.unwrap();
        }

        drop(scratch);
        assert!(!path.exists());
    }
}
