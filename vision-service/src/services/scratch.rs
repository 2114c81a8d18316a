//! On-disk scratch space for uploads in flight.
//!
//! Every upload is written under a freshly generated UUID, so two requests
//! never share a path regardless of the filenames clients send. The returned
//! [`ScratchFile`] owns its path: callers remove it explicitly, and dropping
//! it without doing so removes the file synchronously.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Longest client extension carried over to the scratch name.
const MAX_EXTENSION_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Open the scratch directory, creating it if missing.
    pub async fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root).await?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` to a new uniquely named file.
    pub async fn persist(&self, original_name: &str, data: &[u8]) -> io::Result<ScratchFile> {
        let file_name = match safe_extension(original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        let file = ScratchFile {
            path: self.root.join(file_name),
            released: false,
        };

        // A failed write drops `file`, which removes any partial content.
        fs::write(&file.path, data).await?;
        Ok(file)
    }
}

/// Keep the client's extension only when it is short and alphanumeric.
fn safe_extension(original_name: &str) -> Option<String> {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_ascii_lowercase())
}

/// A scratch file that is deleted when released or dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    released: bool,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path).await
    }

    /// Delete the file. A file that is already gone counts as removed.
    pub async fn remove(mut self) -> io::Result<()> {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove abandoned scratch file"
                );
            }
        }
    }
}
