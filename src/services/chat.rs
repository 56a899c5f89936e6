use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::config_store::ConfigStore;
use super::conversation::truncate_title;
use super::database::Database;
use super::delivery::DeliverySink;
use super::error::{ChatError, ValidationError};
use crate::models::{Conversation, ConversationId, Message, Role};
use crate::providers::{ChatMessage, ChatRole, ChunkConsumer, SinkError};

/// Persona placed ahead of every conversation sent to the model.
pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Inbound chat turn. A missing or zero `conversation_id` starts a new
/// conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamRequest {
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    pub message: String,
}

impl ChatStreamRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_turn(self.conversation_id, &self.message)
    }
}

/// Result of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatOutcome {
    pub conversation_id: ConversationId,
    pub content: String,
}

fn validate_turn(
    conversation_id: Option<ConversationId>,
    message: &str,
) -> Result<(), ValidationError> {
    if let Some(id) = conversation_id.filter(|id| *id < 0) {
        return Err(ValidationError::InvalidConversationId(id));
    }
    if message.trim().is_empty() {
        return Err(ValidationError::Missing("message"));
    }
    Ok(())
}

/// Convert stored history into the sequence sent to the provider.
///
/// The system prompt always comes first. Only user and assistant turns are
/// forwarded; anything else is dropped.
pub fn build_context(history: &[Message]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::new(ChatRole::System, SYSTEM_PROMPT));

    for msg in history {
        let role = match msg.role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
            ref other => {
                tracing::warn!(
                    message_id = msg.id,
                    role = other.as_str(),
                    "skipping message with unsupported role"
                );
                continue;
            }
        };
        messages.push(ChatMessage::new(role, msg.content.clone()));
    }

    messages
}

/// Forwards each chunk to the sink while keeping the full reply.
struct Relay<'a> {
    sink: &'a mut dyn DeliverySink,
    content: String,
}

#[async_trait]
impl ChunkConsumer for Relay<'_> {
    async fn consume(&mut self, chunk: &str) -> Result<(), SinkError> {
        self.content.push_str(chunk);
        self.sink.on_content(chunk).await
    }
}

#[derive(Debug, Clone)]
pub struct ChatService {
    db: Database,
    config: Arc<ConfigStore>,
}

impl ChatService {
    pub fn new(db: Database, config: Arc<ConfigStore>) -> Self {
        Self { db, config }
    }

    /// Run one streamed exchange.
    ///
    /// The conversation exists before `on_start` fires and the user message
    /// is stored before the model is called. The assistant reply is stored
    /// only if generation finishes; a failed or cancelled stream leaves the
    /// user message alone in the history.
    pub async fn chat_stream(
        &self,
        cancel: &CancellationToken,
        conversation_id: Option<ConversationId>,
        user_text: &str,
        sink: &mut dyn DeliverySink,
    ) -> Result<ChatOutcome, ChatError> {
        validate_turn(conversation_id, user_text)?;
        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }

        let conversation_id = self.resolve_conversation(conversation_id, user_text).await?;

        sink.on_start(conversation_id)
            .await
            .map_err(ChatError::Delivery)?;

        self.db
            .insert_message(conversation_id, Role::User, user_text)
            .await?;

        let history = self.db.list_messages(conversation_id).await?;
        let messages = build_context(&history);

        let binding = self.config.snapshot();
        tracing::debug!(
            conversation_id,
            model = %binding.settings().model,
            context_len = messages.len(),
            "starting generation"
        );

        let mut relay = Relay {
            sink,
            content: String::new(),
        };
        binding.generate(cancel, messages, &mut relay).await?;
        let content = relay.content;

        self.db
            .insert_message(conversation_id, Role::Assistant, &content)
            .await?;

        tracing::debug!(conversation_id, reply_len = content.len(), "generation finished");

        Ok(ChatOutcome {
            conversation_id,
            content,
        })
    }

    async fn resolve_conversation(
        &self,
        conversation_id: Option<ConversationId>,
        user_text: &str,
    ) -> Result<ConversationId, ChatError> {
        match conversation_id.filter(|id| *id != 0) {
            Some(id) => match self.db.get_conversation(id).await? {
                Some(conversation) => Ok(conversation.id),
                None => Err(ChatError::ConversationNotFound(id)),
            },
            None => {
                let conversation = self.db.insert_conversation(&truncate_title(user_text)).await?;
                tracing::info!(conversation_id = conversation.id, "created conversation");
                Ok(conversation.id)
            }
        }
    }

    /// Messages of a conversation, oldest first. Unknown ids yield an empty list.
    pub async fn history(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        self.db.list_messages(conversation_id).await
    }

    /// Conversations with the most recently written first.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.db.list_conversations().await
    }

    pub async fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        self.db.get_conversation(id).await
    }

    pub async fn delete_conversation(&self, id: ConversationId) -> Result<bool> {
        self.db.delete_conversation(id).await
    }
}
