//! Groq vision provider implementation.
//!
//! Talks to Groq's OpenAI-compatible chat completions endpoint. Any server
//! speaking the same protocol can be targeted by changing the base URL.

use super::{FinishReason, ProviderError, ProviderResponse, VisionProvider, VisionRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Groq provider configuration.
#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: Secret<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Groq vision provider.
pub struct GroqVisionProvider {
    config: GroqConfig,
    client: Client,
}

impl GroqVisionProvider {
    pub fn new(config: GroqConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    fn build_request<'a>(&'a self, request: &'a VisionRequest) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: &request.prompt,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: &request.image_url,
                        },
                    },
                ],
            }],
            temperature: request.params.temperature,
            max_tokens: request.params.max_tokens,
            top_p: request.params.top_p,
            stream: request.params.stream,
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::NetworkError(err.to_string())
    }
}

#[async_trait]
impl VisionProvider for GroqVisionProvider {
    async fn describe(&self, request: &VisionRequest) -> Result<ProviderResponse, ProviderError> {
        let body = self.build_request(request);
        let url = self.api_url("chat/completions");

        tracing::debug!(
            model = %self.config.model,
            prompt_len = request.prompt.len(),
            image_url_len = request.image_url.len(),
            "Sending request to completion API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited(error_text));
            }

            return Err(ProviderError::ApiError(format!(
                "Completion API error {}: {}",
                status, error_text
            )));
        }

        let api_response: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::ApiError(format!("Failed to parse response: {}", e))
            }
        })?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::ApiError("Completion API returned no choices".to_string())
        })?;

        let usage = api_response.usage.unwrap_or_default();

        Ok(ProviderResponse {
            text: choice.message.content.unwrap_or_default(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            finish_reason: FinishReason::from_api(choice.finish_reason.as_deref()),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Completion API key not configured".to_string(),
            ));
        }

        // Listing models is the cheapest authenticated call.
        let response = self
            .client
            .get(self.api_url("models"))
            .bearer_auth(self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// Chat Completions Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::GenerationParams;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, timeout: Duration) -> GroqVisionProvider {
        GroqVisionProvider::new(GroqConfig {
            api_key: Secret::new("gsk-test".to_string()),
            base_url: base_url.to_string(),
            model: "llama-3.2-11b-vision-preview".to_string(),
            timeout,
        })
        .unwrap()
    }

    fn request() -> VisionRequest {
        VisionRequest {
            prompt: "What is this image?".to_string(),
            image_url: "data:image/jpeg;base64,AAEC".to_string(),
            params: GenerationParams::default(),
        }
    }

    #[test]
    fn request_body_matches_chat_completions_shape() {
        let provider = provider("http://unused", Duration::from_secs(1));
        let request = request();
        let body = serde_json::to_value(provider.build_request(&request)).unwrap();

        assert_eq!(
            body,
            json!({
                "model": "llama-3.2-11b-vision-preview",
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "What is this image?" },
                        { "type": "image_url", "image_url": { "url": "data:image/jpeg;base64,AAEC" } }
                    ]
                }],
                "temperature": 0.0,
                "max_tokens": 1024,
                "top_p": 1.0,
                "stream": false
            })
        );
    }

    #[tokio::test]
    async fn returns_first_choice_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer gsk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "A dog." }, "finish_reason": "stop" },
                    { "message": { "role": "assistant", "content": "Ignored." }, "finish_reason": "stop" }
                ],
                "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider(&server.uri(), Duration::from_secs(5))
            .describe(&request())
            .await
            .unwrap();

        assert_eq!(response.text, "A dog.");
        assert_eq!(response.input_tokens, 12);
        assert_eq!(response.output_tokens, 3);
        assert_eq!(response.finish_reason, FinishReason::Complete);
    }

    #[tokio::test]
    async fn null_content_becomes_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": null }, "finish_reason": "length" }]
            })))
            .mount(&server)
            .await;

        let response = provider(&server.uri(), Duration::from_secs(5))
            .describe(&request())
            .await
            .unwrap();

        assert_eq!(response.text, "");
        assert_eq!(response.finish_reason, FinishReason::Length);
    }

    #[tokio::test]
    async fn empty_choices_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = provider(&server.uri(), Duration::from_secs(5))
            .describe(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::ApiError(ref msg) if msg.contains("no choices")));
    }

    #[tokio::test]
    async fn error_status_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"error":{"message":"Invalid API Key"}}"#),
            )
            .mount(&server)
            .await;

        let err = provider(&server.uri(), Duration::from_secs(5))
            .describe(&request())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("Invalid API Key"));
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = provider(&server.uri(), Duration::from_secs(5))
            .describe(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RateLimited(ref body) if body == "slow down"));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = provider(&server.uri(), Duration::from_millis(200))
            .describe(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Timeout));
    }

    #[tokio::test]
    async fn health_check_lists_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("authorization", "Bearer gsk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .expect(1)
            .mount(&server)
            .await;

        provider(&server.uri(), Duration::from_secs(5))
            .health_check()
            .await
            .unwrap();
    }
}
