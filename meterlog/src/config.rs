/*!
Configuration management for the meter logger.
*/

use serde::{Deserialize, Serialize};
use std::path::Path;
use anyhow::{Context, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub capture: CaptureConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// Load the file if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

/// Device access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// HID raw device node, already configured for 9600 8N1
    pub path: String,

    /// Use the built-in simulated meter instead of a device
    pub simulate: bool,

    /// Give up on a frame after this many transport reports
    pub max_reports_per_frame: usize,

    /// Serial number label attached to the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: "/dev/hidraw0".to_string(),
            simulate: false,
            max_reports_per_frame: ut61ep::protocol::MAX_REPORTS_PER_FRAME,
            serial: None,
        }
    }
}

/// Read loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Pause between successful readings
    pub poll_interval_ms: u64,

    /// Pause before retrying after a failed cycle
    pub retry_delay_ms: u64,

    /// Stop after this many failed cycles in a row
    pub max_consecutive_errors: u32,

    /// Queue size between the reader and output threads
    pub channel_buffer_size: usize,

    /// Stop after this many readings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            retry_delay_ms: 200,
            max_consecutive_errors: 20,
            channel_buffer_size: 64,
            count: None,
        }
    }
}

/// How readings are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// Append the raw frame as hex
    pub show_raw: bool,
}
