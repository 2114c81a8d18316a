//! Mock provider implementation for testing.

use super::{FinishReason, ProviderError, ProviderResponse, VisionProvider, VisionRequest};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

enum Behaviour {
    Reply(String),
    Fail(String),
}

/// Mock vision provider for testing.
///
/// Replies with canned text or a canned API error, optionally after a delay,
/// and remembers every request it was given.
pub struct MockVisionProvider {
    behaviour: Behaviour,
    delay: Option<Duration>,
    finish_reason: FinishReason,
    requests: Mutex<Vec<VisionRequest>>,
}

impl MockVisionProvider {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            behaviour: Behaviour::Reply(text.into()),
            delay: None,
            finish_reason: FinishReason::Complete,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behaviour: Behaviour::Fail(message.into()),
            delay: None,
            finish_reason: FinishReason::Complete,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn finishing_with(mut self, finish_reason: FinishReason) -> Self {
        self.finish_reason = finish_reason;
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<VisionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VisionProvider for MockVisionProvider {
    async fn describe(&self, request: &VisionRequest) -> Result<ProviderResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behaviour {
            Behaviour::Reply(text) => Ok(ProviderResponse {
                text: text.clone(),
                input_tokens: request.prompt.len() as u32 / 4,
                output_tokens: text.len() as u32 / 4,
                finish_reason: self.finish_reason,
            }),
            Behaviour::Fail(message) => Err(ProviderError::ApiError(message.clone())),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn model(&self) -> &str {
        "mock-vision"
    }
}
