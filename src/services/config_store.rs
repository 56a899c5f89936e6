use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use crate::providers::{ProviderBinding, ProviderFactory, ProviderInitError, ProviderSettings};

/// Holds the provider binding every new chat uses.
///
/// Readers clone an `Arc` under a read lock and go; the write lock is only
/// taken for the pointer swap. Updates are serialized so that
/// validate-then-swap is a single step.
pub struct ConfigStore {
    active: RwLock<Arc<ProviderBinding>>,
    update_lock: Mutex<()>,
    factory: Arc<dyn ProviderFactory>,
}

impl ConfigStore {
    pub async fn new(
        factory: Arc<dyn ProviderFactory>,
        settings: ProviderSettings,
    ) -> Result<Self, ProviderInitError> {
        let provider = factory.build(&settings).await?;
        Ok(Self {
            active: RwLock::new(Arc::new(ProviderBinding::new(settings, provider))),
            update_lock: Mutex::new(()),
            factory,
        })
    }

    /// The binding in effect right now. Holding on to it keeps it alive even
    /// if a replacement lands afterwards.
    pub fn snapshot(&self) -> Arc<ProviderBinding> {
        // Only whole Arcs are ever stored, so a poisoned lock still holds a
        // consistent value.
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn settings(&self) -> ProviderSettings {
        self.snapshot().settings().clone()
    }

    /// Build a binding from `settings` and make it active. On failure the
    /// current binding stays in place.
    pub async fn replace(&self, settings: ProviderSettings) -> Result<(), ProviderInitError> {
        let _guard = self.update_lock.lock().await;

        let provider = self.factory.build(&settings).await?;
        tracing::info!(
            provider = %settings.provider,
            model = %settings.model,
            "provider settings replaced"
        );
        let binding = Arc::new(ProviderBinding::new(settings, provider));

        *self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner) = binding;
        Ok(())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("active", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::providers::{AiProvider, ChatRequest, ChunkConsumer, ProviderError};

    /// Provider that answers with fixed chunks; tagged so tests can tell
    /// bindings apart.
    pub(crate) struct EchoProvider {
        pub chunks: Vec<String>,
    }

    #[async_trait]
    impl AiProvider for EchoProvider {
        async fn stream_message(
            &self,
            _request: ChatRequest,
            on_chunk: &mut dyn ChunkConsumer,
        ) -> Result<(), ProviderError> {
            for chunk in &self.chunks {
                on_chunk.consume(chunk).await?;
            }
            Ok(())
        }
    }

    /// Rejects any settings whose key is `"bad"`; otherwise replies with the
    /// model name.
    pub(crate) struct FakeFactory;

    #[async_trait]
    impl ProviderFactory for FakeFactory {
        async fn build(
            &self,
            settings: &ProviderSettings,
        ) -> Result<Arc<dyn AiProvider>, ProviderInitError> {
            if settings.api_key == "bad" {
                return Err(ProviderInitError::MissingApiKey);
            }
            Ok(Arc::new(EchoProvider {
                chunks: vec![format!("from {}", settings.model)],
            }))
        }
    }

    pub(crate) fn settings(model: &str, api_key: &str) -> ProviderSettings {
        ProviderSettings {
            provider: "openai".to_string(),
            model: model.to_string(),
            base_url: String::new(),
            api_key: api_key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_new_rejects_unusable_settings() {
        let result = ConfigStore::new(Arc::new(FakeFactory), settings("m", "bad")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_replace_swaps_binding() {
        let store = ConfigStore::new(Arc::new(FakeFactory), settings("old", "k1"))
            .await
            .unwrap();
        let before = store.snapshot();

        store.replace(settings("new", "k2")).await.unwrap();

        assert_eq!(store.settings().model, "new");
        // A snapshot taken earlier is unaffected.
        assert_eq!(before.settings().model, "old");
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous() {
        let store = ConfigStore::new(Arc::new(FakeFactory), settings("old", "k1"))
            .await
            .unwrap();

        let err = store.replace(settings("new", "bad")).await.unwrap_err();

        assert!(matches!(err, ProviderInitError::MissingApiKey));
        assert_eq!(store.settings().model, "old");
        assert_eq!(store.settings().api_key, "k1");
    }

    #[tokio::test]
    async fn test_concurrent_replaces_leave_one_winner() {
        let store = Arc::new(
            ConfigStore::new(Arc::new(FakeFactory), settings("m0", "k"))
                .await
                .unwrap(),
        );

        let handles: Vec<_> = (1..=8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.replace(settings(&format!("m{i}"), "k")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let model = store.settings().model;
        assert!((1..=8).any(|i| model == format!("m{i}")));
    }
}
