//! Configuration management for the sync engine.

use crate::error::Result;
use crate::platform;
use serde::{Deserialize, Serialize};

/// Tunables for the conversation sync engine.
///
/// The defaults reproduce the shipped behavior; the decay window is kept
/// longer than the idle timeout so a peer's last heartbeat survives
/// propagation delay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Seconds of input inactivity before the local typing state is cleared.
    #[serde(default = "default_typing_idle_secs")]
    pub typing_idle_secs: u64,

    /// Seconds a peer's typing heartbeat stays valid when observed.
    #[serde(default = "default_typing_decay_secs")]
    pub typing_decay_secs: u64,

    /// Seconds after sending during which "delete for everyone" is allowed.
    #[serde(default = "default_delete_window_secs")]
    pub delete_for_everyone_window_secs: u64,
}

fn default_typing_idle_secs() -> u64 {
    3
}

fn default_typing_decay_secs() -> u64 {
    5
}

fn default_delete_window_secs() -> u64 {
    60 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            typing_idle_secs: default_typing_idle_secs(),
            typing_decay_secs: default_typing_decay_secs(),
            delete_for_everyone_window_secs: default_delete_window_secs(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    pub fn load() -> Result<Self> {
        let config_path = platform::config_file_path();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let mut config: Config = serde_json::from_str(&contents)?;
            config.fix_invalid_values();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Fix any invalid or empty values with sensible defaults.
    fn fix_invalid_values(&mut self) {
        if self.typing_idle_secs == 0 {
            self.typing_idle_secs = default_typing_idle_secs();
        }
        if self.typing_decay_secs == 0 {
            self.typing_decay_secs = default_typing_decay_secs();
        }
        // A decay window shorter than the idle timeout would flicker the
        // peer's indicator off before our own timer clears it.
        if self.typing_decay_secs < self.typing_idle_secs {
            self.typing_decay_secs = self.typing_idle_secs + 2;
        }
        if self.delete_for_everyone_window_secs == 0 {
            self.delete_for_everyone_window_secs = default_delete_window_secs();
        }
    }

    /// Save configuration to the default config file.
    pub fn save(&mut self) -> Result<()> {
        self.fix_invalid_values();

        let config_path = platform::config_file_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;

        Ok(())
    }

    /// Load configuration from environment variables, falling back to file/defaults.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;

        if let Ok(secs) = std::env::var("DUOCHAT_TYPING_IDLE_SECS") {
            if let Ok(secs) = secs.parse() {
                config.typing_idle_secs = secs;
            }
        }

        if let Ok(secs) = std::env::var("DUOCHAT_TYPING_DECAY_SECS") {
            if let Ok(secs) = secs.parse() {
                config.typing_decay_secs = secs;
            }
        }

        config.fix_invalid_values();
        Ok(config)
    }

    /// Idle timeout as a signed duration for wall-clock arithmetic.
    pub fn typing_idle(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.typing_idle_secs as i64)
    }

    /// Decay window as a signed duration for wall-clock arithmetic.
    pub fn typing_decay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.typing_decay_secs as i64)
    }

    /// Delete-for-everyone window as a signed duration.
    pub fn delete_for_everyone_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.delete_for_everyone_window_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.typing_idle_secs, 3);
        assert_eq!(config.typing_decay_secs, 5);
        assert_eq!(config.delete_for_everyone_window_secs, 3600);
    }

    #[test]
    fn test_fix_invalid_values() {
        let mut config = Config {
            typing_idle_secs: 0,
            typing_decay_secs: 0,
            delete_for_everyone_window_secs: 0,
        };
        config.fix_invalid_values();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_decay_never_shorter_than_idle() {
        let mut config = Config {
            typing_idle_secs: 10,
            typing_decay_secs: 4,
            delete_for_everyone_window_secs: 3600,
        };
        config.fix_invalid_values();
        assert!(config.typing_decay_secs > config.typing_idle_secs);
    }
}
