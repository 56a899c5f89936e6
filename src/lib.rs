//! Streaming chat backend for OpenAI-compatible LLM providers.
//!
//! [`services::ChatService`] runs a chat turn: it stores the user's message,
//! streams the model's reply through a [`services::DeliverySink`] as it
//! arrives, then stores the reply. The provider in use lives in a
//! [`services::ConfigStore`] and can be swapped at runtime without disturbing
//! streams already in flight.

pub mod config;
pub mod models;
pub mod providers;
pub mod services;
