//! Configuration loading and management

use anyhow::{Context, Result};
use crosspost_adapters::{DEFAULT_TIMEOUT, facebook, telegram};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub facebook: FacebookConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// User that owns accounts and posts when `--user` is not given
    #[serde(default)]
    pub user_id: Option<Uuid>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_telegram_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("./crosspost.sqlite")
}

fn default_request_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

fn default_graph_base_url() -> String {
    facebook::DEFAULT_GRAPH_URL.to_string()
}

fn default_api_version() -> String {
    facebook::DEFAULT_API_VERSION.to_string()
}

fn default_telegram_api_base_url() -> String {
    telegram::DEFAULT_API_URL.to_string()
}

fn default_bot_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            user_id: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            graph_base_url: default_graph_base_url(),
            api_version: default_api_version(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base_url: default_telegram_api_base_url(),
            bot_token_env: default_bot_token_env(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("CROSSPOST")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.general.request_timeout_secs.max(1))
    }

    /// Pick the explicit user, falling back to `general.user_id`
    pub fn resolve_user(&self, user: Option<Uuid>) -> Result<Uuid> {
        user.or(self.general.user_id).context(
            "No user id: pass --user or set general.user_id (CROSSPOST__GENERAL__USER_ID)",
        )
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        format!(
            r#"# crosspost configuration

[general]
database_path = "./crosspost.sqlite"
# Owner of connected accounts and published posts
user_id = "{user_id}"
# Bound on every outbound platform call
request_timeout_secs = {timeout}

[facebook]
enabled = true
graph_base_url = "{graph}"
api_version = "{version}"

[telegram]
enabled = true
api_base_url = "{telegram}"
bot_token_env = "TELEGRAM_BOT_TOKEN"
"#,
            user_id = Uuid::new_v4(),
            timeout = default_request_timeout(),
            graph = facebook::DEFAULT_GRAPH_URL,
            version = facebook::DEFAULT_API_VERSION,
            telegram = telegram::DEFAULT_API_URL,
        )
    }
}
