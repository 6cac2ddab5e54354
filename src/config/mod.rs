//! # Configuration Management Module
//!
//! Configuration is read from a TOML file. Every section and field has a
//! default, so an empty file (or one produced by `smlbridge init`) is valid.
//!
//! - [`SerialConfig`] - meter port settings
//! - [`PipelineConfig`] - framing limits, watchdog and tick pacing
//! - [`SinkConfig`] - register count and optional JSON mirror file
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Configuration File Format
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//!
//! [pipeline]
//! buffer_capacity = 3840
//! watchdog_timeout_secs = 30
//! tick_interval_ms = 50
//! stats_interval_secs = 300
//!
//! [sink]
//! slots = 4
//! state_file = "registers.json"
//!
//! [logging]
//! level = "info"
//! file = "smlbridge.log"
//! ```
//!
//! Precedence: CLI args > config file > defaults.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::sml::{DEFAULT_BUFFER_CAPACITY, MIN_DATAGRAM_LEN};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path of the IR reading head, e.g. `/dev/ttyUSB0`. Empty means
    /// the port must be given on the command line.
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Largest datagram accepted, tail included.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Seconds a started datagram may take before it is abandoned.
    #[serde(default = "default_watchdog_timeout_secs")]
    pub watchdog_timeout_secs: u64,
    /// Delay between scheduling ticks (ms).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Interval for logging pipeline counters (0 disables).
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_watchdog_timeout_secs() -> u64 {
    30
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_stats_interval_secs() -> u64 {
    300
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            watchdog_timeout_secs: default_watchdog_timeout_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_secs(self.watchdog_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Number of 32-bit registers exposed downstream.
    #[serde(default = "default_slots")]
    pub slots: usize,
    /// Mirror registers to this JSON file after every write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
}

fn default_slots() -> usize {
    4
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            state_file: Some("registers.json".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Parsed level; unknown names fall back to `info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;
        Self::from_toml(&content).map_err(|e| anyhow!("Invalid config file {}: {}", path, e))
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let content = toml::to_string_pretty(&Config::default())
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;
        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.buffer_capacity < MIN_DATAGRAM_LEN {
            bail!(
                "pipeline.buffer_capacity must be at least {} bytes, got {}",
                MIN_DATAGRAM_LEN,
                self.pipeline.buffer_capacity
            );
        }
        if self.pipeline.watchdog_timeout_secs == 0 {
            bail!("pipeline.watchdog_timeout_secs must be greater than 0");
        }
        if self.pipeline.tick_interval_ms == 0 {
            bail!("pipeline.tick_interval_ms must be greater than 0");
        }
        if self.sink.slots == 0 {
            bail!("sink.slots must be greater than 0");
        }
        if self.serial.baud_rate == 0 {
            bail!("serial.baud_rate must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.pipeline.buffer_capacity, 3840);
        assert_eq!(config.pipeline.watchdog_timeout(), Duration::from_secs(30));
        assert_eq!(config.sink.slots, 4);
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [pipeline]
            watchdog_timeout_secs = 10

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.watchdog_timeout_secs, 10);
        assert_eq!(config.pipeline.tick_interval_ms, 50);
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            "[pipeline]\nbuffer_capacity = 8",
            "[pipeline]\nwatchdog_timeout_secs = 0",
            "[pipeline]\ntick_interval_ms = 0",
            "[sink]\nslots = 0",
            "[serial]\nbaud_rate = 0",
        ];
        for case in cases {
            assert!(Config::from_toml(case).is_err(), "expected '{}' to fail", case);
        }
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let logging = LoggingConfig {
            level: "chatty".to_string(),
            file: None,
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.sink.state_file.as_deref(), Some("registers.json"));
        assert_eq!(parsed.serial.port, "/dev/ttyUSB0");
    }
}
