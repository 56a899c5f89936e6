pub mod binding;
pub mod openai;
pub mod presets;
pub mod traits;
pub mod types;

pub use binding::{ProviderBinding, ProviderInitError, ProviderSettings, DEFAULT_BASE_URL};
pub use presets::{ProviderPreset, PROVIDER_PRESETS};
pub use traits::{AiProvider, ChunkConsumer, ProviderFactory};
pub use types::{ChatMessage, ChatRequest, ChatRole, ProviderError, SinkError};
