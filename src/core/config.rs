use anyhow::{Context, Result, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

fn default_max_age_hours() -> u64 {
    24
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Age after which a cached snapshot is refetched.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
    /// Coalesce concurrent refreshes of the same symbol.
    #[serde(default = "default_true")]
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_age_hours: default_max_age_hours(),
            single_flight: true,
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        hours(self.max_age_hours)
    }
}

/// Converts a freshness window in hours, saturating instead of overflowing.
pub fn hours(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(3600))
}

fn default_yahoo_range() -> String {
    "1y".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
    #[serde(default = "default_yahoo_range")]
    pub range: String,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            range: default_yahoo_range(),
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_max_output_tokens() -> u32 {
    256
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiProviderConfig {
    pub base_url: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for GeminiProviderConfig {
    fn default() -> Self {
        GeminiProviderConfig {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: default_gemini_model(),
            api_key_env: default_api_key_env(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub yahoo: YahooProviderConfig,
    #[serde(default)]
    pub gemini: GeminiProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    /// Loads the default config file, falling back to defaults when it is absent.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "tickerfolio", "tickerfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "tickerfolio", "tickerfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.cache.max_age_hours > 0,
            "cache.max_age_hours must be greater than zero"
        );
        Ok(())
    }
}
