//! Service configuration.
//!
//! Loaded from TOML. Every section is optional; missing fields take their
//! defaults. Platform credentials can also come from the environment so
//! they need not be written to disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crossfeed_search::{Platform, SearchConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Environment variable holding the YouTube Data API key.
pub const YOUTUBE_API_KEY_ENV: &str = "CROSSFEED_YOUTUBE_API_KEY";
/// Environment variable holding the Twitter API bearer token.
pub const TWITTER_BEARER_TOKEN_ENV: &str = "CROSSFEED_TWITTER_BEARER_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Aggregation engine settings.
    pub search: SearchConfig,
    /// Account tiers, quotas and user assignments.
    pub accounts: AccountsConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port; 0 picks a free port.
    pub port: u16,
    /// Seconds between background cache sweeps; 0 disables the sweeper.
    pub cache_sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8787,
            cache_sweep_interval_secs: 60,
        }
    }
}

/// Account tiers and which users belong to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Tier for users not listed in `users` (including anonymous callers).
    pub default_tier: String,
    /// Tier definitions by name.
    pub tiers: BTreeMap<String, TierConfig>,
    /// User id to tier name.
    pub users: BTreeMap<String, String>,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        let mut tiers = BTreeMap::new();
        tiers.insert(
            "free".to_owned(),
            TierConfig {
                monthly_credits: 100,
                gated_platforms: Vec::new(),
            },
        );
        tiers.insert(
            "pro".to_owned(),
            TierConfig {
                monthly_credits: 5_000,
                gated_platforms: vec![Platform::Twitter],
            },
        );
        Self {
            default_tier: "free".to_owned(),
            tiers,
            users: BTreeMap::new(),
        }
    }
}

/// One account tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Usage credits per calendar month (one credit per platform searched).
    pub monthly_credits: u64,
    /// Gated platforms this tier may search.
    pub gated_platforms: Vec<Platform>,
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ServiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `explicit` if given (it must exist), otherwise from the
    /// default path if present, otherwise defaults. Environment overrides
    /// are applied and the result validated.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or the final
    /// configuration is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    tracing::info!(path = %path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Fill platform credentials from `lookup` (normally the process
    /// environment). Non-empty values replace what the file said.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty(YOUTUBE_API_KEY_ENV) {
            self.search.platforms.youtube.api_key = Some(key);
        }
        if let Some(token) = non_empty(TWITTER_BEARER_TOKEN_ENV) {
            self.search.platforms.twitter.bearer_token = Some(token);
        }
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.search
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        let accounts = &self.accounts;
        if !accounts.tiers.contains_key(&accounts.default_tier) {
            return Err(ServiceError::Config(format!(
                "default_tier '{}' is not a defined tier",
                accounts.default_tier
            )));
        }
        if let Some((user, tier)) = accounts
            .users
            .iter()
            .find(|(_, tier)| !accounts.tiers.contains_key(*tier))
        {
            return Err(ServiceError::Config(format!(
                "user '{user}' is assigned to undefined tier '{tier}'"
            )));
        }
        Ok(())
    }

    /// Returns the default config file path: `~/.config/crossfeed/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("crossfeed").join("config.toml")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".config").join("crossfeed").join("config.toml")
        } else {
            std::env::temp_dir().join("crossfeed").join("config.toml")
        }
    }
}
