pub mod chat;
pub mod config_store;
pub mod conversation;
pub mod database;
pub mod delivery;
pub mod error;
pub mod settings;

pub use chat::{ChatOutcome, ChatService, ChatStreamRequest};
pub use config_store::ConfigStore;
pub use database::Database;
pub use delivery::{stream_to_sink, DeliverySink, SseSink, StreamFrame};
pub use error::{ChatError, ValidationError};
pub use settings::{SettingsError, SettingsRequest, SettingsService, SettingsView};
