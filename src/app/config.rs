use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::{CategorySpec, LogEncoding};
use crate::grammar;
use crate::relay::DeliveryConfig;

/// Chat sink connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Bot token; may also come from the GAMEWARDEN_BOT_TOKEN env var
    #[serde(default)]
    pub bot_token: String,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry attempts after a 429
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Total wait budget per delivery before deferring to the next tick
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    /// Channel for the live status board (disabled when unset)
    pub status_channel_id: Option<String>,
    /// How often the status board is rebuilt
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
    /// Minimum spacing between edits of the same live message
    #[serde(default = "default_min_edit_interval_secs")]
    pub min_edit_interval_secs: u64,
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_wait_secs() -> u64 {
    15
}

fn default_status_interval_secs() -> u64 {
    60
}

fn default_min_edit_interval_secs() -> u64 {
    30
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            bot_token: String::new(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_wait_secs: default_max_wait_secs(),
            status_channel_id: None,
            status_interval_secs: default_status_interval_secs(),
            min_edit_interval_secs: default_min_edit_interval_secs(),
        }
    }
}

impl DiscordConfig {
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            api_base: self.api_base.clone(),
            bot_token: self.bot_token.clone(),
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            max_wait_secs: self.max_wait_secs,
        }
    }
}

/// One tailed log category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Category name; selects the grammar and the log filename prefix
    pub name: String,
    /// Directory the server writes this category's logs into
    pub log_dir: PathBuf,
    /// Channel the events are relayed to
    pub channel_id: String,
    #[serde(default = "default_category_enabled")]
    pub enabled: bool,
    /// Seconds between ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Log file encoding; game servers on Windows typically write UTF-16 LE
    #[serde(default)]
    pub encoding: LogEncoding,
}

fn default_category_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    15
}

impl CategoryConfig {
    pub fn spec(&self) -> CategorySpec {
        CategorySpec {
            name: self.name.clone(),
            log_dir: self.log_dir.clone(),
            channel_id: self.channel_id.clone(),
            encoding: self.encoding,
        }
    }
}

/// Tailing engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Where checkpoint files live
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

fn default_checkpoint_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "gamewarden")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("gamewarden"))
        .join("checkpoints")
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: default_checkpoint_dir(),
            categories: Vec::new(),
        }
    }
}

/// Scheduled restart announcements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Daily restart times, "HH:MM" in UTC
    #[serde(default)]
    pub times: Vec<String>,
    /// Minutes before a restart at which warnings are posted
    #[serde(default = "default_warn_minutes")]
    pub warn_minutes: Vec<u64>,
    /// Channel the warnings go to
    #[serde(default)]
    pub channel_id: String,
    /// Reacting with this emoji on a warning postpones the restart
    #[serde(default = "default_postpone_emoji")]
    pub postpone_emoji: String,
    /// How far one postponement pushes the restart
    #[serde(default = "default_postpone_minutes")]
    pub postpone_minutes: u64,
}

fn default_warn_minutes() -> Vec<u64> {
    vec![30, 10, 5]
}

fn default_postpone_emoji() -> String {
    "\u{1f552}".to_string()
}

fn default_postpone_minutes() -> u64 {
    30
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            times: Vec::new(),
            warn_minutes: default_warn_minutes(),
            channel_id: String::new(),
            postpone_emoji: default_postpone_emoji(),
            postpone_minutes: default_postpone_minutes(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub restart: RestartConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            discord: DiscordConfig::default(),
            relay: RelayConfig::default(),
            restart: RestartConfig::default(),
        }
    }
}

impl Config {
    /// Load the config file, creating a default one on first launch.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
            Ok(config)
        } else {
            let config = Self::default();
            if let Err(e) = config.save() {
                tracing::warn!("Failed to save default config: {}", e);
            }
            Ok(config)
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let base_dirs = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))?;
        Ok(base_dirs.home_dir().join(".config/gamewarden/config.toml"))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    /// Validate everything that would otherwise only fail at runtime:
    /// token presence, category names and grammars, restart times.
    pub fn validate(&self) -> Result<()> {
        if self.bot_token().is_empty() {
            anyhow::bail!(
                "No bot token configured (set discord.bot_token or GAMEWARDEN_BOT_TOKEN)"
            );
        }

        let mut seen = std::collections::HashSet::new();
        for category in &self.relay.categories {
            if !seen.insert(category.name.as_str()) {
                anyhow::bail!("Duplicate category '{}'", category.name);
            }
            grammar::Grammar::builtin(&category.name)
                .map_err(|e| anyhow::anyhow!("Category '{}': {}", category.name, e))?;
            if category.channel_id.is_empty() {
                anyhow::bail!("Category '{}' has no channel_id", category.name);
            }
            if category.interval_secs == 0 {
                anyhow::bail!("Category '{}' has a zero poll interval", category.name);
            }
        }

        if self.restart.enabled {
            if self.restart.channel_id.is_empty() {
                anyhow::bail!("Restart announcements enabled without a channel_id");
            }
            for time in &self.restart.times {
                parse_clock_time(time)
                    .ok_or_else(|| anyhow::anyhow!("Invalid restart time '{}'", time))?;
            }
        }

        Ok(())
    }

    /// Token from the environment wins over the config file, so the file can
    /// be committed without the secret.
    pub fn bot_token(&self) -> String {
        std::env::var("GAMEWARDEN_BOT_TOKEN").unwrap_or_else(|_| self.discord.bot_token.clone())
    }
}

/// Parse "HH:MM" into (hour, minute).
pub fn parse_clock_time(value: &str) -> Option<(u32, u32)> {
    let (hour, minute) = value.split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}
