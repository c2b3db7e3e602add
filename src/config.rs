use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default PhotoTag.ai keyword endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://server.phototag.ai/api/keywords";

/// Top-level configuration for the batch tagger.
///
/// Holds the remote service settings (credential included) and the names of
/// the two terminal folders created under the processed directory.
///
/// # Loading
///
/// ```rust,no_run
/// use phototag_batch::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.service.api_token = "pt-...".into();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Remote tagging service settings.
    pub service: ServiceConfig,
    /// Terminal folder names.
    pub output: OutputConfig,
}

/// Settings for the PhotoTag.ai keyword service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bearer token sent in the `Authorization` header.
    pub api_token: String,
    /// Full URL of the keyword endpoint.
    pub endpoint: String,
    /// Language code for the generated text.
    pub language: String,
    /// Upper bound on the number of keywords returned per image.
    pub max_keywords: u32,
}

/// Names of the subfolders processed images are moved into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Folder for images whose metadata was written.
    pub ready_dir: String,
    /// Folder for every other image.
    pub failed_dir: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: "en".to_string(),
            max_keywords: 40,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ready_dir: "ready".to_string(),
            failed_dir: "failed".to_string(),
        }
    }
}

impl Config {
    /// Resolve the config file path: `config.json` next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Check that a batch can be started with this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.service.api_token.trim().is_empty() {
            anyhow::bail!("No API token configured. Set `service.api_token` in config.json or pass --token.");
        }
        if self.service.endpoint.trim().is_empty() {
            anyhow::bail!("Service endpoint is empty");
        }
        if self.service.max_keywords == 0 {
            anyhow::bail!("`service.max_keywords` must be at least 1");
        }
        if self.output.ready_dir.is_empty() || self.output.failed_dir.is_empty() {
            anyhow::bail!("Output folder names must not be empty");
        }
        if self.output.ready_dir == self.output.failed_dir {
            anyhow::bail!("`output.ready_dir` and `output.failed_dir` must differ");
        }
        Ok(())
    }
}
