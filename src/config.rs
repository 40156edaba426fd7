use anyhow::{Context, Result};
use dirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lister: ListerConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListerConfig {
    /// Delay before a deferred or coalesced refresh actually runs.
    #[serde(default = "default_refresh_delay_ms")]
    pub refresh_delay_ms: u64,

    /// Debounce window for filter edits before a recompute.
    #[serde(default = "default_filter_debounce_ms")]
    pub filter_debounce_ms: u64,

    /// Buffer capacity of the lister's broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl ListerConfig {
    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    pub fn filter_debounce(&self) -> Duration {
        Duration::from_millis(self.filter_debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Buffer capacity of the change bus.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,

    /// How many published events the bus keeps for debugging.
    #[serde(default = "default_history")]
    pub history: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = fs::read_to_string(path).context("Failed to read config file")?;
            let config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            info!("Config loaded successfully");
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("lightbox").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lister: ListerConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Default for ListerConfig {
    fn default() -> Self {
        Self {
            refresh_delay_ms: default_refresh_delay_ms(),
            filter_debounce_ms: default_filter_debounce_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
            history: default_history(),
        }
    }
}

// Default value functions
fn default_refresh_delay_ms() -> u64 {
    50
}
fn default_filter_debounce_ms() -> u64 {
    50
}
fn default_event_capacity() -> usize {
    256
}
fn default_history() -> usize {
    100
}
