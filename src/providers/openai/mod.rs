mod adapter;
mod models;
mod stream;

pub use adapter::{OpenAiFactory, OpenAiProvider};
pub use stream::{forward_sse_stream, SseDecoder};
