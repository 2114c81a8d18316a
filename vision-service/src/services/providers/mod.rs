//! Vision model provider abstractions and implementations.
//!
//! This module provides a trait-based abstraction over vision-capable
//! completion backends, allowing the relay to swap between the hosted
//! Groq API and a mock.

pub mod groq;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out")]
    Timeout,
}

/// Result of a provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Text of the first completion choice.
    pub text: String,

    /// Input tokens consumed.
    pub input_tokens: u32,

    /// Output tokens generated.
    pub output_tokens: u32,

    /// Finish reason.
    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn from_api(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") | None => FinishReason::Complete,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(_) => FinishReason::Other,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Complete => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Other => "other",
        }
    }
}

/// Decoding parameters for a completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl Default for GenerationParams {
    /// Greedy decoding, nucleus sampling disabled, no streaming.
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 1024,
            stream: false,
        }
    }
}

/// One user turn: a text prompt followed by an inline image.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,

    /// Image reference, typically a `data:` URI.
    pub image_url: String,

    pub params: GenerationParams,
}

/// Trait for vision-capable completion providers (e.g., Groq).
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Describe an image according to the prompt.
    async fn describe(&self, request: &VisionRequest) -> Result<ProviderResponse, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;

    /// Model identifier used for requests.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_labels_follow_api_names() {
        for label in ["stop", "length", "content_filter"] {
            assert_eq!(FinishReason::from_api(Some(label)).as_str(), label);
        }
        assert_eq!(FinishReason::from_api(Some("tool_calls")).as_str(), "other");
        assert_eq!(FinishReason::from_api(None), FinishReason::Complete);
    }
}
