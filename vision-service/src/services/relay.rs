//! Inference relay: one uploaded image in, one description out.

use crate::models::UploadArtifact;
use crate::services::metrics;
use crate::services::providers::{
    FinishReason, GenerationParams, ProviderError, VisionProvider, VisionRequest,
};
use crate::services::scratch::{ScratchDir, ScratchFile};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Prompt sent alongside every image.
pub const DESCRIBE_PROMPT: &str = "What is this image?";

/// MIME type written into the data URI for every upload, whatever its real
/// format.
pub const IMAGE_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Provider(ProviderError),

    #[error("Completion API did not respond within {0:?}")]
    Timeout(Duration),
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Timeout(_) => AppError::GatewayTimeout(err.to_string()),
            other => AppError::ServerError(other.to_string()),
        }
    }
}

/// Encode raw image bytes as an inline `data:` URI.
pub fn encode_data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", IMAGE_MIME_TYPE, STANDARD.encode(bytes))
}

#[derive(Clone)]
pub struct InferenceRelay {
    provider: Arc<dyn VisionProvider>,
    scratch: ScratchDir,
    params: GenerationParams,
    timeout: Duration,
}

impl InferenceRelay {
    pub fn new(provider: Arc<dyn VisionProvider>, scratch: ScratchDir, timeout: Duration) -> Self {
        Self {
            provider,
            scratch,
            params: GenerationParams::default(),
            timeout,
        }
    }

    pub fn provider(&self) -> &Arc<dyn VisionProvider> {
        &self.provider
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Describe one uploaded image.
    ///
    /// The scratch copy of the upload is gone by the time this returns,
    /// whatever the outcome.
    pub async fn describe(&self, upload: &UploadArtifact) -> Result<String, RelayError> {
        let start = Instant::now();
        let result = self.persist_and_describe(upload).await;
        let elapsed = start.elapsed();

        let outcome = match &result {
            Ok(_) => "success",
            Err(RelayError::Timeout(_)) => "timeout",
            Err(_) => "failure",
        };
        metrics::record_description(self.provider.model(), outcome, elapsed);

        match &result {
            Ok(description) => tracing::info!(
                file_name = %upload.file_name,
                size = upload.len(),
                description_len = description.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Image described"
            ),
            Err(e) => tracing::error!(
                file_name = %upload.file_name,
                size = upload.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "Failed to describe image"
            ),
        }

        result
    }

    async fn persist_and_describe(&self, upload: &UploadArtifact) -> Result<String, RelayError> {
        let file = self.scratch.persist(&upload.file_name, &upload.data).await?;

        let result = self.describe_file(&file).await;

        let path = file.path().display().to_string();
        if let Err(e) = file.remove().await {
            tracing::warn!(path = %path, error = %e, "Failed to remove scratch file");
        }

        result
    }

    async fn describe_file(&self, file: &ScratchFile) -> Result<String, RelayError> {
        let bytes = file.read().await?;

        let request = VisionRequest {
            prompt: DESCRIBE_PROMPT.to_string(),
            image_url: encode_data_uri(&bytes),
            params: self.params.clone(),
        };

        let response = tokio::time::timeout(self.timeout, self.provider.describe(&request))
            .await
            .map_err(|_| RelayError::Timeout(self.timeout))?
            .map_err(|e| match e {
                ProviderError::Timeout => RelayError::Timeout(self.timeout),
                other => RelayError::Provider(other),
            })?;

        metrics::record_tokens(
            self.provider.model(),
            response.input_tokens,
            response.output_tokens,
        );
        metrics::record_finish_reason(self.provider.model(), response.finish_reason);

        if response.finish_reason != FinishReason::Complete {
            tracing::warn!(
                finish_reason = response.finish_reason.as_str(),
                output_tokens = response.output_tokens,
                "Completion stopped before finishing"
            );
        }

        Ok(response.text)
    }
}
