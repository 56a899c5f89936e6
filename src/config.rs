//! Process configuration.
//!
//! Sources, lowest priority first: built-in defaults, a TOML file (explicit
//! path, or `$XDG_CONFIG_HOME/parley/config.toml` when present), then the
//! environment (`AI_PROVIDER`, `AI_MODEL`, `AI_BASE_URL`, `AI_API_KEY`,
//! `DATABASE_PATH`).

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::providers::ProviderSettings;

pub const APP_NAME: &str = "parley";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Provider used at startup; replaced at runtime through the settings
    /// surface.
    pub ai: ProviderSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            ai: ProviderSettings {
                provider: "openai".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                base_url: String::new(),
                api_key: String::new(),
            },
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(config_path).extract().map_err(Box::new)
    }

    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        match config_path {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Some(global_path) = global_config_path().filter(|p| p.exists()) {
                    figment = figment.merge(Toml::file(global_path));
                }
            }
        }

        figment
            .merge(Env::prefixed("AI_").map(|key| format!("ai.{}", key).into()))
            .merge(Env::raw().only(&["DATABASE_PATH"]))
    }
}

fn data_home() -> Option<PathBuf> {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
}

fn default_database_path() -> PathBuf {
    match data_home() {
        Some(dir) => dir.join(APP_NAME).join("parley.db"),
        None => PathBuf::from("parley.db"),
    }
}

pub fn global_config_path() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|dir| dir.join(APP_NAME).join("config.toml"))
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.ai.provider, "openai");
        assert_eq!(config.ai.model, "gpt-3.5-turbo");
        assert!(config.ai.base_url.is_empty());
        assert!(config.database_path.ends_with("parley.db"));
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "parley.toml",
                r#"
                    database_path = "chat.db"

                    [ai]
                    provider = "deepseek"
                    model = "deepseek-chat"
                    base_url = "https://api.deepseek.com/v1"
                "#,
            )?;
            jail.set_env("AI_API_KEY", "sk-from-env");
            jail.set_env("AI_MODEL", "deepseek-coder");

            let config: AppConfig = AppConfig::figment(Some(Path::new("parley.toml"))).extract()?;

            assert_eq!(config.database_path, PathBuf::from("chat.db"));
            assert_eq!(config.ai.provider, "deepseek");
            assert_eq!(config.ai.model, "deepseek-coder");
            assert_eq!(config.ai.base_url, "https://api.deepseek.com/v1");
            assert_eq!(config.ai.api_key, "sk-from-env");
            Ok(())
        });
    }

    #[test]
    fn test_database_path_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("DATABASE_PATH", "/tmp/other.db");
            let config: AppConfig = AppConfig::figment(Some(Path::new("missing.toml"))).extract()?;
            assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
            Ok(())
        });
    }
}
