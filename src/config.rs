use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Catalog API credentials. Absent until the operator configures
    /// them; uploads are blocked without them.
    #[serde(default)]
    pub credentials: Option<CatalogCredentials>,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub lookup: LookupConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogCredentials {
    pub account_name: String,
    pub app_key: String,
    pub app_token: String,

    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_environment() -> String {
    "vtexcommercestable".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_ai_endpoint() -> String {
    "http://127.0.0.1:1234/v1".to_string()
}

fn default_vision_model() -> String {
    "gemma-3-4b".to_string()
}

fn default_image_model() -> String {
    "flux.1-schnell".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ai_endpoint(),
            vision_model: default_vision_model(),
            image_model: default_image_model(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Storefront base URL queried for product data.
    #[serde(default = "default_store_base_url")]
    pub base_url: String,
}

fn default_store_base_url() -> String {
    "https://portal.vtexcommercestable.com.br".to_string()
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skustudio")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_no_credentials() {
        let config = Config::default();
        assert!(config.credentials.is_none());
        assert_eq!(config.ai.endpoint, "http://127.0.0.1:1234/v1");
    }

    #[test]
    fn credentials_round_trip_through_toml() {
        let mut config = Config::default();
        config.credentials = Some(CatalogCredentials {
            account_name: "acme".to_string(),
            app_key: "vtexappkey-acme".to_string(),
            app_token: "secret".to_string(),
            environment: default_environment(),
        });

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        let creds = parsed.credentials.unwrap();
        assert_eq!(creds.account_name, "acme");
        assert_eq!(creds.environment, "vtexcommercestable");
    }

    #[test]
    fn missing_environment_falls_back_to_stable() {
        let parsed: Config = toml::from_str(
            r#"
            [credentials]
            account_name = "acme"
            app_key = "k"
            app_token = "t"
            "#,
        )
        .unwrap();
        assert_eq!(
            parsed.credentials.unwrap().environment,
            "vtexcommercestable"
        );
    }
}
