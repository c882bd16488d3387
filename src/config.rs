use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 12345;
pub const DEFAULT_UPDATE_INTERVAL: u64 = 5;

const MIN_PORT: u16 = 1024;
const MIN_UPDATE_INTERVAL: u64 = 1;
const MAX_UPDATE_INTERVAL: u64 = 3600;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }

    pairs
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub listener: ListenerConfig,
}

/// Settings for one listener instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// UDP port, bound on all interfaces
    pub port: u16,
    /// Minimum seconds between host-visible updates of one attribute.
    /// Also the period of the pending-value sweep.
    pub update_interval: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            update_interval: DEFAULT_UPDATE_INTERVAL,
        }
    }
}

impl ListenerConfig {
    /// Check the port and interval ranges accepted by the configuration form.
    pub fn validate(&self) -> Result<()> {
        if self.port < MIN_PORT {
            return Err(BridgeError::InvalidPort(self.port));
        }
        if !(MIN_UPDATE_INTERVAL..=MAX_UPDATE_INTERVAL).contains(&self.update_interval) {
            return Err(BridgeError::InvalidUpdateInterval(self.update_interval));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("UDP_LISTENER_PORT")
            && let Ok(p) = port.parse()
        {
            config.listener.port = p;
        }
        if let Ok(interval) = std::env::var("UDP_UPDATE_INTERVAL")
            && let Ok(i) = interval.parse()
        {
            config.listener.update_interval = i;
        }

        config
    }
}
