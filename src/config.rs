use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

/// Immutable application configuration. Loaded once at startup; components
/// receive the value (or a sub-struct) at construction. Updating settings
/// means building a new `AppConfig`; nothing mutates state that in-flight
/// queries already read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub scraper: ScraperConfig,
    pub images: ImageConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Full search endpoint, e.g. "https://serpapi.com/search".
    pub endpoint: String,
    pub api_key: String,
    /// Interface language sent as `hl`.
    pub hl: String,
    /// Geolocation sent as `gl`.
    pub gl: String,
    pub request_timeout: u64,
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub chrome_path: Option<String>,
    /// How long to wait for a selector to appear at all, in milliseconds.
    pub selector_timeout_ms: u64,
    /// Fixed grace delay after network idle, for re-renders that never
    /// touch the network.
    pub settle_grace_ms: u64,
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub base_folder: String,
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub enabled: bool,
    pub shop_url: String,
    pub access_token: String,
    pub api_version: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Pick up a local .env before the environment source reads it.
        dotenvy::dotenv().ok();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("ESSENZA").separator("__"))
            .set_default("search.endpoint", "https://serpapi.com/search")?
            .set_default("search.api_key", "")?
            .set_default("search.hl", "it")?
            .set_default("search.gl", "it")?
            .set_default("search.request_timeout", 30)?
            .set_default("search.retry_attempts", 2)?
            .set_default(
                "scraper.user_agent",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
            )?
            .set_default("scraper.selector_timeout_ms", 5000)?
            .set_default("scraper.settle_grace_ms", 1500)?
            .set_default("scraper.request_timeout", 30)?
            .set_default("images.base_folder", "images")?
            .set_default("images.max_dimension", 2000)?
            .set_default("images.jpeg_quality", 85)?
            .set_default("catalog.enabled", false)?
            .set_default("catalog.shop_url", "")?
            .set_default("catalog.access_token", "")?
            .set_default("catalog.api_version", "2024-01")?
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    /// Produce an updated configuration without touching this one. Callers
    /// holding the old value keep operating on it unchanged.
    pub fn with_search(&self, search: SearchConfig) -> Result<Self, ConfigError> {
        let updated = Self {
            search,
            ..self.clone()
        };
        updated.validate()?;
        Ok(updated)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.api_key.is_empty() {
            return Err(ConfigError::Message(
                "search.api_key must be set (ESSENZA_SEARCH__API_KEY)".into(),
            ));
        }

        if Url::parse(&self.search.endpoint).is_err() {
            return Err(ConfigError::Message("Invalid search endpoint URL".into()));
        }

        if self.scraper.selector_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "scraper.selector_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.images.jpeg_quality == 0 || self.images.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "images.jpeg_quality must be between 1 and 100".into(),
            ));
        }

        if self.images.max_dimension == 0 {
            return Err(ConfigError::Message(
                "images.max_dimension must be greater than 0".into(),
            ));
        }

        if self.catalog.enabled {
            if Url::parse(&self.catalog.shop_url).is_err() {
                return Err(ConfigError::Message(
                    "catalog.shop_url must be a valid URL when the catalog is enabled".into(),
                ));
            }
            if self.catalog.access_token.is_empty() {
                return Err(ConfigError::Message(
                    "catalog.access_token must be set when the catalog is enabled".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn valid_config() -> AppConfig {
        AppConfig {
            search: SearchConfig {
                endpoint: "https://serpapi.com/search".to_string(),
                api_key: "test-key".to_string(),
                hl: "it".to_string(),
                gl: "it".to_string(),
                request_timeout: 30,
                retry_attempts: 2,
            },
            scraper: ScraperConfig {
                user_agent: "TestAgent/1.0".to_string(),
                chrome_path: None,
                selector_timeout_ms: 5000,
                settle_grace_ms: 1500,
                request_timeout: 30,
            },
            images: ImageConfig {
                base_folder: "images".to_string(),
                max_dimension: 2000,
                jpeg_quality: 85,
            },
            catalog: CatalogConfig {
                enabled: false,
                shop_url: String::new(),
                access_token: String::new(),
                api_version: "2024-01".to_string(),
            },
        }
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_missing_api_key() {
        let mut config = valid_config();
        config.search.api_key = String::new();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("api_key"));
    }

    #[test]
    fn test_config_validation_invalid_endpoint() {
        let mut config = valid_config();
        config.search.endpoint = "not-a-valid-url".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("endpoint"));
    }

    #[test]
    fn test_config_validation_invalid_jpeg_quality() {
        let mut config = valid_config();
        config.images.jpeg_quality = 101;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("jpeg_quality must be between 1 and 100"));
    }

    #[test]
    fn test_catalog_validation_only_when_enabled() {
        let mut config = valid_config();
        config.catalog.enabled = true;

        let result = config.validate();
        assert!(result.is_err());

        config.catalog.shop_url = "https://example.myshopify.com".to_string();
        config.catalog.access_token = "token".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_search_leaves_original_untouched() {
        let config = valid_config();
        let mut search = config.search.clone();
        search.gl = "de".to_string();

        let updated = config.with_search(search).unwrap();
        assert_eq!(updated.search.gl, "de");
        assert_eq!(config.search.gl, "it");
    }
}
