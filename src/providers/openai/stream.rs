use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use super::models::OpenAiStreamChunk;
use crate::providers::traits::ChunkConsumer;
use crate::providers::types::ProviderError;

/// Incremental `text/event-stream` decoder yielding the `data:` payload of
/// each complete event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    byte_buf: Vec<u8>,
    buffer: String,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.byte_buf.extend_from_slice(bytes);
        self.decode_available();

        // Normalized over the whole buffer so a CRLF split across reads
        // still joins up.
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut payloads = Vec::new();
        while let Some(event_end) = self.buffer.find("\n\n") {
            let event_text: String = self.buffer.drain(..event_end + 2).collect();
            if let Some(payload) = Self::event_data(&event_text) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush an event left unterminated when the body ended.
    pub fn finish(&mut self) -> Option<String> {
        if !self.byte_buf.is_empty() {
            let rest = String::from_utf8_lossy(&self.byte_buf).into_owned();
            self.byte_buf.clear();
            self.buffer.push_str(&rest);
        }
        let event_text = std::mem::take(&mut self.buffer).replace("\r\n", "\n");
        Self::event_data(&event_text)
    }

    /// Move every decodable byte into `buffer`. Invalid sequences become
    /// U+FFFD; an incomplete sequence at the end waits for the next read.
    fn decode_available(&mut self) {
        loop {
            match std::str::from_utf8(&self.byte_buf) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.byte_buf.clear();
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.byte_buf[..valid_up_to]));
                    match e.error_len() {
                        None => {
                            self.byte_buf.drain(..valid_up_to);
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.byte_buf.drain(..valid_up_to + len);
                        }
                    }
                }
            }
        }
    }

    fn event_data(event_text: &str) -> Option<String> {
        let lines: Vec<&str> = event_text
            .lines()
            .filter_map(|line| {
                line.strip_prefix("data: ")
                    .or_else(|| line.strip_prefix("data:"))
            })
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// Drive an OpenAI-style SSE body, handing each content delta to `on_chunk`.
///
/// The next network read only happens after `on_chunk` has returned.
pub async fn forward_sse_stream<S, E>(
    stream: S,
    on_chunk: &mut dyn ChunkConsumer,
) -> Result<(), ProviderError>
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = SseDecoder::default();

    while let Some(chunk_result) = stream.next().await {
        let bytes = chunk_result
            .map_err(|e| ProviderError::NetworkError(format!("Stream error: {}", e)))?;

        for payload in decoder.push(&bytes) {
            if deliver(&payload, on_chunk).await? {
                return Ok(());
            }
        }
    }

    if let Some(payload) = decoder.finish() {
        deliver(&payload, on_chunk).await?;
    }

    // Body ended without [DONE]; treat the close as completion.
    Ok(())
}

/// Returns `true` once the terminating `[DONE]` marker is seen.
async fn deliver(payload: &str, on_chunk: &mut dyn ChunkConsumer) -> Result<bool, ProviderError> {
    if payload.trim() == "[DONE]" {
        return Ok(true);
    }

    match serde_json::from_str::<OpenAiStreamChunk>(payload) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                return Err(ProviderError::RequestFailed(error.message));
            }
            let content = chunk
                .choices
                .first()
                .and_then(|choice| choice.delta.content.as_deref());
            if let Some(content) = content.filter(|c| !c.is_empty()) {
                on_chunk.consume(content).await?;
            }
        }
        Err(e) => {
            return Err(ProviderError::InvalidResponse(format!(
                "unparseable stream event: {}",
                e
            )));
        }
    }

    Ok(false)
}
