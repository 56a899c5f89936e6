use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::models::*;
use super::stream::forward_sse_stream;
use crate::providers::binding::{ProviderInitError, ProviderSettings};
use crate::providers::traits::{AiProvider, ChunkConsumer, ProviderFactory};
use crate::providers::types::{ChatMessage, ChatRequest, ProviderError};

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAiProvider {
    client: Client,
}

impl OpenAiProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn build_messages(messages: &[ChatMessage]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            })
            .collect()
    }

    fn build_auth_header(api_key: &str) -> Option<String> {
        if api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", api_key))
        }
    }

    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return format!("HTTP {}: {}", status.as_u16(), parsed.error.message);
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    fn retry_after(response: &reqwest::Response) -> Option<u64> {
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn stream_message(
        &self,
        request: ChatRequest,
        on_chunk: &mut dyn ChunkConsumer,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/chat/completions", request.base_url.trim_end_matches('/'));

        let openai_request = OpenAiRequest {
            model: request.model.clone(),
            messages: Self::build_messages(&request.messages),
            stream: true,
        };

        let mut req = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .json(&openai_request);

        if let Some(auth) = Self::build_auth_header(&request.api_key) {
            req = req.header("Authorization", auth);
        }

        tracing::debug!(%url, model = %request.model, "opening completion stream");

        let response = req
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: Self::retry_after(&response),
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        forward_sse_stream(response.bytes_stream(), on_chunk).await
    }
}

/// Builds [`OpenAiProvider`]s after checking the settings are usable.
#[derive(Debug, Default, Clone)]
pub struct OpenAiFactory;

impl OpenAiFactory {
    pub fn check(settings: &ProviderSettings) -> Result<(), ProviderInitError> {
        if settings.model.trim().is_empty() {
            return Err(ProviderInitError::MissingModel);
        }
        if settings.api_key.trim().is_empty() {
            return Err(ProviderInitError::MissingApiKey);
        }

        let base = settings.effective_base_url();
        let parsed = Url::parse(base).map_err(|e| ProviderInitError::InvalidBaseUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProviderInitError::InvalidBaseUrl {
                url: base.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ProviderFactory for OpenAiFactory {
    async fn build(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn AiProvider>, ProviderInitError> {
        Self::check(settings)?;

        let client = Client::builder()
            .build()
            .map_err(|e| ProviderInitError::Client(e.to_string()))?;

        Ok(Arc::new(OpenAiProvider::new(client)))
    }
}
