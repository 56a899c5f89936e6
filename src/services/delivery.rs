use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::chat::{ChatOutcome, ChatService, ChatStreamRequest};
use super::error::ChatError;
use crate::models::ConversationId;
use crate::providers::SinkError;

/// Where a chat stream's events go.
///
/// `ChatService::chat_stream` drives `on_start` and `on_content`; the
/// terminal `on_error`/`on_done` come from [`stream_to_sink`]. Every call is
/// awaited before the stream moves on.
#[async_trait]
pub trait DeliverySink: Send {
    async fn on_start(&mut self, conversation_id: ConversationId) -> Result<(), SinkError>;

    async fn on_content(&mut self, chunk: &str) -> Result<(), SinkError>;

    async fn on_error(&mut self, message: &str) -> Result<(), SinkError>;

    async fn on_done(&mut self, conversation_id: ConversationId) -> Result<(), SinkError>;
}

/// JSON body of one server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame<'a> {
    Start { conversation_id: ConversationId },
    Content { content: &'a str },
    Error { error: &'a str },
    Done { conversation_id: ConversationId },
}

impl StreamFrame<'_> {
    /// Encode as a complete `data: ...\n\n` event.
    pub fn to_sse(&self) -> Result<Bytes, SinkError> {
        let json = serde_json::to_string(self).map_err(|e| SinkError::Failed(e.to_string()))?;
        Ok(Bytes::from(format!("data: {}\n\n", json)))
    }
}

/// Writes SSE frames into a bounded channel, one frame per send.
///
/// The channel bound is what slows generation down when the client reads
/// slowly; a dropped receiver surfaces as [`SinkError::Disconnected`].
#[derive(Debug, Clone)]
pub struct SseSink {
    tx: mpsc::Sender<Bytes>,
}

impl SseSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end the transport should drain.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    async fn send(&self, frame: StreamFrame<'_>) -> Result<(), SinkError> {
        let bytes = frame.to_sse()?;
        self.tx
            .send(bytes)
            .await
            .map_err(|_| SinkError::Disconnected)
    }
}

#[async_trait]
impl DeliverySink for SseSink {
    async fn on_start(&mut self, conversation_id: ConversationId) -> Result<(), SinkError> {
        self.send(StreamFrame::Start { conversation_id }).await
    }

    async fn on_content(&mut self, chunk: &str) -> Result<(), SinkError> {
        self.send(StreamFrame::Content { content: chunk }).await
    }

    async fn on_error(&mut self, message: &str) -> Result<(), SinkError> {
        self.send(StreamFrame::Error { error: message }).await
    }

    async fn on_done(&mut self, conversation_id: ConversationId) -> Result<(), SinkError> {
        self.send(StreamFrame::Done { conversation_id }).await
    }
}

/// Run a chat turn and finish the stream with a `done` or `error` event.
///
/// Validation failures return before any event is sent so the transport can
/// answer with a plain error status instead. Cancelled streams get no
/// terminal event.
pub async fn stream_to_sink(
    service: &ChatService,
    cancel: &CancellationToken,
    request: ChatStreamRequest,
    sink: &mut dyn DeliverySink,
) -> Result<ChatOutcome, ChatError> {
    request.validate()?;

    let result = service
        .chat_stream(cancel, request.conversation_id, &request.message, sink)
        .await;

    let terminal = match &result {
        Ok(outcome) => sink.on_done(outcome.conversation_id).await,
        Err(ChatError::Cancelled) | Err(ChatError::Delivery(SinkError::Disconnected)) => Ok(()),
        Err(err) => {
            tracing::error!("chat stream failed: {}", err);
            sink.on_error(&err.to_string()).await
        }
    };
    if let Err(e) = terminal {
        tracing::warn!("failed to send terminal stream event: {}", e);
    }

    result
}
