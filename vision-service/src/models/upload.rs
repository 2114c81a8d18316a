use axum::body::Bytes;

/// Fallback name for a file part that carried no filename.
pub const UNNAMED_UPLOAD: &str = "upload";

/// An image received from a client, held in memory for one request.
#[derive(Debug, Clone)]
pub struct UploadArtifact {
    /// Client-supplied filename. Untrusted: never used as a path.
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadArtifact {
    pub fn new(file_name: Option<&str>, content_type: Option<&str>, data: Bytes) -> Self {
        let file_name = file_name
            .filter(|name| !name.is_empty())
            .unwrap_or(UNNAMED_UPLOAD)
            .to_string();

        Self {
            file_name,
            content_type: content_type.map(str::to_string),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
