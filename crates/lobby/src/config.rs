//! Relay configuration: defaults, an optional TOML file, then environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chess_rules::PromotionPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {var}")]
    Env { var: String, value: String },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    pub host: String,
    pub port: u16,
    /// Sessions that may exist at once. One means a single shared lobby.
    pub max_sessions: usize,
    /// Delay between a game ending and its session being reset.
    pub reset_delay_ms: u64,
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub promotion_policy: PromotionPolicy,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_sessions: 1,
            reset_delay_ms: 5000,
            idle_timeout_secs: 30 * 60,
            sweep_interval_secs: 60,
            promotion_policy: PromotionPolicy::AutoQueen,
        }
    }
}

impl LobbyConfig {
    /// Defaults, overlaid by `path` if given, overlaid by the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply overrides from `LOBBY_HOST`, `PORT`/`LOBBY_PORT`,
    /// `LOBBY_MAX_SESSIONS` and `LOBBY_RESET_DELAY_MS`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = lookup("LOBBY_HOST") {
            self.host = host;
        }
        for var in ["PORT", "LOBBY_PORT"] {
            if let Some(v) = lookup(var) {
                self.port = parse_env(var, &v)?;
            }
        }
        if let Some(v) = lookup("LOBBY_MAX_SESSIONS") {
            self.max_sessions = parse_env("LOBBY_MAX_SESSIONS", &v)?;
        }
        if let Some(v) = lookup("LOBBY_RESET_DELAY_MS") {
            self.reset_delay_ms = parse_env("LOBBY_RESET_DELAY_MS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 {
            return Err(ConfigError::Invalid("max_sessions must be at least 1".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}
