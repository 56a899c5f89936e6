use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::traits::{AiProvider, ChunkConsumer};
use super::types::{ChatMessage, ChatRequest, ProviderError};

/// Endpoint used when `base_url` is left empty.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum ProviderInitError {
    #[error("Model name is required")]
    MissingModel,

    #[error("API key is required")]
    MissingApiKey,

    #[error("Invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// Everything needed to reach the provider. Never persisted.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub provider: String,
    pub model: String,
    /// Empty means [`DEFAULT_BASE_URL`].
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl ProviderSettings {
    pub fn effective_base_url(&self) -> &str {
        if self.base_url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            self.base_url.trim()
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

/// A constructed provider together with the settings it was built from.
///
/// Bindings are immutable; changing settings means building a new one.
pub struct ProviderBinding {
    settings: ProviderSettings,
    provider: Arc<dyn AiProvider>,
}

impl ProviderBinding {
    pub fn new(settings: ProviderSettings, provider: Arc<dyn AiProvider>) -> Self {
        Self { settings, provider }
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Run one streaming generation.
    ///
    /// Chunks reach `on_chunk` in order. A consumer error aborts the request and
    /// comes back as [`ProviderError::Sink`]. If `cancel` fires first the
    /// in-flight request is dropped and nothing more is delivered.
    pub async fn generate(
        &self,
        cancel: &CancellationToken,
        messages: Vec<ChatMessage>,
        on_chunk: &mut dyn ChunkConsumer,
    ) -> Result<(), ProviderError> {
        let request = ChatRequest {
            api_key: self.settings.api_key.clone(),
            model: self.settings.model.clone(),
            base_url: self.settings.effective_base_url().to_string(),
            messages,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = self.provider.stream_message(request, on_chunk) => result,
        }
    }
}

impl std::fmt::Debug for ProviderBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBinding")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
