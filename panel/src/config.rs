use std::env::var_os;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::layout::{KeyLayout, LedLayout};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where and how submissions are sent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub ssid: String,
    pub password: String,
    /// Endpoint the selection is POSTed to.
    pub url: String,
    /// Fields merged into every submitted payload.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct KeypadConfig {
    /// Number of touch inputs clocked out per scan (8 or 16).
    pub inputs: usize,
    pub settle_us: u64,
    /// Report every touched key instead of only the lowest one.
    pub multi: bool,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        KeypadConfig {
            inputs: 16,
            settle_us: 1000,
            multi: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Timing {
    pub tick_ms: u64,
    /// Seconds without a key press before the selection is cleared.
    pub inactivity_seconds: u64,
    /// Presses arriving fewer ticks than this after the previous one are dropped. 0 disables.
    pub min_press_interval_ticks: u32,
    pub blink_count: u32,
    pub blink_interval_ms: u64,
    /// Pause after a failed submission.
    pub failure_delay_ms: u64,
    pub connect_attempts: u32,
    pub poll_interval_ms: u64,
    pub radio_settle_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            tick_ms: 1000,
            inactivity_seconds: 60,
            min_press_interval_ticks: 0,
            blink_count: 3,
            blink_interval_ms: 150,
            failure_delay_ms: 1000,
            connect_attempts: 20,
            poll_interval_ms: 1000,
            radio_settle_ms: 1000,
            request_timeout_ms: 10_000,
        }
    }
}

impl Timing {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_seconds)
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn radio_settle(&self) -> Duration {
        Duration::from_millis(self.radio_settle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Missing network settings leave the panel working offline; every submission fails.
    pub network: Option<NetworkConfig>,
    pub keypad: KeypadConfig,
    pub keys: KeyLayout,
    pub leds: LedLayout,
    pub timing: Timing,
}

impl Config {
    /// Path of the config file, from `CONFIG_FILE` or `config.json`.
    pub fn path() -> PathBuf {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("config.json"));
        PathBuf::from(config_str)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Loads the config, falling back to the default wiring with submission disabled
    /// if the file is missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Couldn't load {}: {}. Running offline with the default layout.", path.display(), e);
                Config::default()
            }
        }
    }

    /// Checks the key and LED layouts against the hardware. Network and timing settings
    /// never stop the panel from starting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.keys.validate(self.keypad.inputs)?;
        self.leds.validate(&self.keys)
    }
}
