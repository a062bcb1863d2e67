//! Configuration management for Trinity
//!
//! Settings come from a TOML file (see [`resolve_config_path`]) with
//! environment variables applied on top. Every section is optional; a
//! deployment can run from environment variables alone.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::publisher::FanoutPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub publish: PublishConfig,
    pub telegram: TelegramConfig,
    pub twitter: TwitterConfig,
    pub pinterest: PinterestConfig,
    pub facebook: FacebookConfig,
    pub instagram: InstagramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/trinity/posts.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in humantime notation ("25s", "1m")
    pub timeout: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: "25s".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.timeout).map_err(|e| {
            ConfigError::InvalidValue {
                field: "http.timeout".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub policy: FanoutPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: Option<String>,
    /// Bot API host, overridable for tests
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_secret: Option<String>,
    pub api_base: Option<String>,
    pub upload_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PinterestConfig {
    pub access_token: Option<String>,
    pub board_id: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacebookConfig {
    pub access_token: Option<String>,
    pub page_id: Option<String>,
    pub graph_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstagramConfig {
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub graph_base: Option<String>,
}

impl Config {
    /// Load configuration from the default location, then apply environment overrides
    ///
    /// A missing file is not an error: defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Self::default_config()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.http.timeout()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()));
    }

    /// Apply overrides from an arbitrary lookup, keyed by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = lookup(key) {
                *slot = Some(value);
            }
        };

        if let Some(path) = lookup("DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(timeout) = lookup("TRINITY_HTTP_TIMEOUT") {
            self.http.timeout = timeout;
        }
        if let Some(policy) = lookup("TRINITY_PUBLISH_POLICY").and_then(|p| p.parse().ok()) {
            self.publish.policy = policy;
        }

        set(&mut self.telegram.token, "TELEGRAM_TOKEN");

        set(&mut self.twitter.consumer_key, "TWITTER_CONSUMER_KEY");
        set(&mut self.twitter.consumer_secret, "TWITTER_CONSUMER_SECRET");
        set(&mut self.twitter.access_token, "TWITTER_ACCESS_TOKEN");
        set(&mut self.twitter.access_secret, "TWITTER_ACCESS_SECRET");

        set(&mut self.pinterest.access_token, "PINTEREST_ACCESS_TOKEN");
        set(&mut self.pinterest.board_id, "PINTEREST_BOARD_ID");

        set(&mut self.facebook.access_token, "FACEBOOK_ACCESS_TOKEN");
        set(&mut self.facebook.page_id, "FACEBOOK_PAGE_ID");

        set(&mut self.instagram.access_token, "INSTAGRAM_ACCESS_TOKEN");
        set(&mut self.instagram.user_id, "INSTAGRAM_USER_ID");
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TRINITY_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("trinity").join("config.toml"))
}
