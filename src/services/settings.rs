use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::config_store::ConfigStore;
use super::error::ValidationError;
use crate::providers::{ProviderInitError, ProviderPreset, ProviderSettings, PROVIDER_PRESETS};

const MASK: &str = "****";

/// What callers get to see of the active settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsView {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsRequest {
    #[serde(default)]
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
}

impl SettingsRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::Missing("model"));
        }
        if self.api_key.trim().is_empty() {
            return Err(ValidationError::Missing("api_key"));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to initialize provider: {0}")]
    ProviderInit(#[from] ProviderInitError),
}

/// Hide all but the edges of a credential.
pub fn mask_api_key(key: &str) -> String {
    let len = key.chars().count();
    if len > 8 {
        let head: String = key.chars().take(4).collect();
        let tail: String = key.chars().skip(len - 4).collect();
        format!("{}{}{}", head, MASK, tail)
    } else if len > 0 {
        MASK.to_string()
    } else {
        String::new()
    }
}

#[derive(Debug, Clone)]
pub struct SettingsService {
    store: Arc<ConfigStore>,
}

impl SettingsService {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    pub fn get(&self) -> SettingsView {
        let settings = self.store.settings();
        SettingsView {
            api_key: mask_api_key(&settings.api_key),
            provider: settings.provider,
            model: settings.model,
            base_url: settings.base_url,
        }
    }

    /// Replace the whole settings tuple. Nothing changes unless the new
    /// settings produce a working provider.
    pub async fn update(&self, request: SettingsRequest) -> Result<(), SettingsError> {
        request.validate()?;
        self.store
            .replace(ProviderSettings {
                provider: request.provider,
                model: request.model,
                base_url: request.base_url,
                api_key: request.api_key,
            })
            .await?;
        Ok(())
    }

    pub fn presets(&self) -> &'static [ProviderPreset] {
        PROVIDER_PRESETS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::config_store::tests::{settings, FakeFactory};

    async fn service() -> SettingsService {
        let store = ConfigStore::new(Arc::new(FakeFactory), settings("gpt-4o", "sk-1234567890"))
            .await
            .unwrap();
        SettingsService::new(Arc::new(store))
    }

    fn request(model: &str, api_key: &str) -> SettingsRequest {
        SettingsRequest {
            provider: "deepseek".to_string(),
            model: model.to_string(),
            base_url: "https://api.deepseek.com/v1".to_string(),
            api_key: api_key.to_string(),
        }
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("sk-1234567890"), "sk-1****7890");
        assert_eq!(mask_api_key("abc"), "****");
        assert_eq!(mask_api_key("12345678"), "****");
        assert_eq!(mask_api_key("123456789"), "1234****6789");
        assert_eq!(mask_api_key(""), "");
    }

    #[tokio::test]
    async fn test_get_masks_key() {
        let view = service().await.get();
        assert_eq!(view.model, "gpt-4o");
        assert_eq!(view.api_key, "sk-1****7890");
    }

    #[tokio::test]
    async fn test_update_replaces_everything() {
        let service = service().await;
        service.update(request("deepseek-chat", "sk-abcdefghijk")).await.unwrap();

        let view = service.get();
        assert_eq!(view.provider, "deepseek");
        assert_eq!(view.model, "deepseek-chat");
        assert_eq!(view.base_url, "https://api.deepseek.com/v1");
        assert_eq!(view.api_key, "sk-a****hijk");
    }

    #[tokio::test]
    async fn test_failed_update_keeps_prior_settings() {
        let service = service().await;
        let before = service.get();

        let err = service.update(request("deepseek-chat", "bad")).await.unwrap_err();
        assert!(matches!(err, SettingsError::ProviderInit(_)));
        assert_eq!(service.get(), before);
    }

    #[tokio::test]
    async fn test_update_validates_fields() {
        let service = service().await;
        let err = service.update(request("", "sk-abc")).await.unwrap_err();
        assert!(matches!(err, SettingsError::Validation(ValidationError::Missing("model"))));

        let err = service.update(request("m", " ")).await.unwrap_err();
        assert!(matches!(err, SettingsError::Validation(ValidationError::Missing("api_key"))));
    }

    #[tokio::test]
    async fn test_presets_come_from_catalog() {
        let service = service().await;
        assert_eq!(service.presets(), PROVIDER_PRESETS);
    }
}
