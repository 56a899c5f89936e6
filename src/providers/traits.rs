use std::sync::Arc;

use async_trait::async_trait;

use super::binding::{ProviderInitError, ProviderSettings};
use super::types::{ChatRequest, ProviderError, SinkError};

/// Receives generated text one fragment at a time.
///
/// Providers await `consume` before reading more from the network, so a slow
/// consumer slows the upstream read instead of growing a buffer.
#[async_trait]
pub trait ChunkConsumer: Send {
    async fn consume(&mut self, chunk: &str) -> Result<(), SinkError>;
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Stream a completion for `request`, handing every text fragment to
    /// `on_chunk` in arrival order. Returns once the remote stream completes.
    async fn stream_message(
        &self,
        request: ChatRequest,
        on_chunk: &mut dyn ChunkConsumer,
    ) -> Result<(), ProviderError>;
}

/// Turns settings into a usable provider, or explains why it can't.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn build(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn AiProvider>, ProviderInitError>;
}
