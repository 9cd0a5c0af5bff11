use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::error::Result;

pub const DEFAULT_API_URL: &str = "https://api.roboflow.com";
pub const DEFAULT_BATCH_NAME: &str = "Pip Package Upload";

static CONFIG: OnceCell<Config> = OnceCell::new();

/// Process-wide client settings, read from `API_URL` and `DEFAULT_BATCH_NAME`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_batch_name")]
    pub default_batch_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            default_batch_name: default_batch_name(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut config: Config = envy::from_env()?;
        config.api_url = config.api_url.trim_end_matches('/').to_string();
        Ok(config)
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_batch_name() -> String {
    DEFAULT_BATCH_NAME.to_string()
}

/// Loads the configuration from the environment and installs it for the process.
///
/// Call once before constructing any entity. Later calls return the value
/// installed first.
pub fn init() -> Result<&'static Config> {
    CONFIG.get_or_try_init(Config::from_env)
}

/// Installs an explicit configuration. Returns `false` when one was already installed.
pub fn init_with(config: Config) -> bool {
    CONFIG.set(config).is_ok()
}

pub fn current() -> &'static Config {
    CONFIG.get_or_init(|| match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!("Falling back to default configuration: {error}");
            Config::default()
        }
    })
}
