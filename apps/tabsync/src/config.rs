use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::fake::FakePlayerConfig;
use crate::selector::TabListDefinition;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabSyncConfig {
    /// Seconds between full sweeps; zero or less turns the sweep off.
    pub tablist_update_interval: f64,
    pub drain_interval_ms: u64,
    /// Viewers resynced per drain tick.
    pub drain_batch_size: usize,
    pub use_scoreboard_to_bypass_16_char_limit: bool,
    /// Seconds between server pings; zero turns pinging off.
    pub ping_delay: u64,
    /// Players on these servers are hidden from everyone without
    /// `tabsync.seevanished`.
    pub hidden_servers: Vec<String>,
    pub log_filter: String,
    pub tab_lists: Vec<TabListDefinition>,
    /// Listed like connected players, but never connect.
    pub fake_players: Vec<FakePlayerConfig>,
}

impl Default for TabSyncConfig {
    fn default() -> Self {
        Self {
            tablist_update_interval: 1.0,
            drain_interval_ms: 50,
            drain_batch_size: 32,
            use_scoreboard_to_bypass_16_char_limit: true,
            ping_delay: 0,
            hidden_servers: Vec::new(),
            log_filter: "info".to_string(),
            tab_lists: Vec::new(),
            fake_players: Vec::new(),
        }
    }
}

impl TabSyncConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` when given, defaults otherwise, then applies the process
    /// environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from `lookup` (normally the process environment).
    /// Unparseable values are logged and ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_parsed(
            &lookup,
            "TABSYNC_UPDATE_INTERVAL",
            &mut self.tablist_update_interval,
        );
        override_parsed(&lookup, "TABSYNC_DRAIN_INTERVAL_MS", &mut self.drain_interval_ms);
        override_parsed(&lookup, "TABSYNC_DRAIN_BATCH", &mut self.drain_batch_size);
        if let Some(value) = lookup("TABSYNC_BYPASS_16_CHAR") {
            self.use_scoreboard_to_bypass_16_char_limit =
                matches!(value.trim(), "1" | "true" | "TRUE" | "yes" | "on");
        }
        override_parsed(&lookup, "TABSYNC_PING_DELAY", &mut self.ping_delay);
        if let Some(filter) = lookup("RUST_LOG").filter(|f| !f.trim().is_empty()) {
            self.log_filter = filter;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tablist_update_interval.is_finite() {
            return Err(ConfigError::Invalid(
                "tablist_update_interval must be a finite number".into(),
            ));
        }
        if self.drain_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "drain_interval_ms must be at least 1".into(),
            ));
        }
        if self.drain_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "drain_batch_size must be at least 1".into(),
            ));
        }
        for tab_list in &self.tab_lists {
            tab_list.validate().map_err(ConfigError::Invalid)?;
        }
        for fake in &self.fake_players {
            fake.validate().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    /// `None` when the sweep is off.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.tablist_update_interval > 0.0)
            .then(|| Duration::try_from_secs_f64(self.tablist_update_interval).ok())
            .flatten()
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms.max(1))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_delay)
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}
