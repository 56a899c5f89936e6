use thiserror::Error;

use crate::models::ConversationId;
use crate::providers::{ProviderError, SinkError};

/// A request that should never have reached the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid conversation id {0}")]
    InvalidConversationId(ConversationId),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conversation {0} not found")]
    ConversationNotFound(ConversationId),

    #[error("Failed to deliver stream event: {0}")]
    Delivery(#[source] SinkError),

    #[error("Failed to generate response: {0}")]
    Generation(#[source] ProviderError),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl From<ProviderError> for ChatError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => ChatError::Cancelled,
            other => ChatError::Generation(other),
        }
    }
}
