//! Configuration module for CanLog-RS
//!
//! This module handles:
//! - The acquisition configuration file (`canlog.toml`)
//! - Application state persistence (last output directory)
//! - Command-line overrides
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.canlog.canlog-rs/`
//! - **macOS**: `~/Library/Application Support/dev.canlog.canlog-rs/`
//! - **Windows**: `%APPDATA%\dev.canlog.canlog-rs\`
//!
//! # Files
//!
//! - `app_state.json` - Last confirmed output directory
//! - `logs/` - Daily diagnostic logs
//!
//! # Example
//!
//! ```ignore
//! use canlog_rs::config::{AppConfig, AppState};
//!
//! let config = AppConfig::load_or_default("canlog.toml");
//! let mut state = AppState::load_or_default();
//! state.remember_output_dir("/data/can");
//! state.save()?;
//! ```

pub mod cli;

pub use cli::Cli;

use crate::error::{CanLogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.canlog.canlog-rs";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Default configuration filename
pub const DEFAULT_CONFIG_FILE: &str = "canlog.toml";

/// Default log file age before rotation (24 hours)
pub const DEFAULT_ROTATION_PERIOD_SECS: u64 = 24 * 60 * 60;

/// Default bound on a single receive call
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 1000;

/// Default number of lines kept in the display
pub const DEFAULT_DISPLAY_MAX_LINES: usize = 2000;

/// Default bus bitrate
pub const DEFAULT_BITRATE: u32 = 500_000;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        CanLogError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            CanLogError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the app state file
pub fn app_state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(APP_STATE_FILE))
}

// ==================== Acquisition Config ====================

/// Which bus driver feeds the acquisition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    /// Generated traffic from the schema, no hardware
    #[default]
    Virtual,
    /// Linux SocketCAN interface
    Socketcan,
}

/// Bus transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Driver to use
    pub kind: BusKind,
    /// Interface or channel name (e.g. `can0`)
    pub channel: String,
    /// Nominal bitrate, informational for SocketCAN
    pub bitrate: u32,
    /// Receive queue capacity, 0 for unbounded
    pub queue_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::Virtual,
            channel: "can0".to_string(),
            bitrate: DEFAULT_BITRATE,
            queue_capacity: 0,
        }
    }
}

/// Signal database location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub path: PathBuf,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("LEM.toml"),
        }
    }
}

/// Serialized form of each log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// `timestamp=... id=0x100 message=Name signal=value ...`
    #[default]
    KeyValue,
    /// One JSON object per line
    JsonLines,
}

/// Rotating log file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFileConfig {
    /// File name prefix, followed by `_<sequence>`
    pub base_name: String,
    /// File extension without the dot
    pub extension: String,
    /// Maximum age of one file in seconds
    pub rotation_period_secs: u64,
    /// Line format
    pub format: LogFormat,
    /// fsync after every record, not just on rotation and close
    ///
    /// On by default so a written record survives power loss. Turning it off
    /// raises throughput on slow storage; records since the last rotation
    /// then sit in the OS cache until the file is closed.
    pub sync_every_record: bool,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            base_name: "LEM_Sensor".to_string(),
            extension: "txt".to_string(),
            rotation_period_secs: DEFAULT_ROTATION_PERIOD_SECS,
            format: LogFormat::KeyValue,
            sync_every_record: true,
        }
    }
}

impl LogFileConfig {
    /// Rotation period as a duration
    pub fn rotation_period(&self) -> Duration {
        Duration::from_secs(self.rotation_period_secs)
    }
}

/// Acquisition loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Upper bound on one receive call in milliseconds
    pub receive_timeout_ms: u64,
    /// Lines kept in the operator display
    pub display_max_lines: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            display_max_lines: DEFAULT_DISPLAY_MAX_LINES,
        }
    }
}

impl AcquisitionConfig {
    /// Receive timeout as a duration
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

/// Demo traffic generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualBusConfig {
    /// Delay between generated frames in milliseconds
    pub interval_ms: u64,
    /// Stop (and report a disconnect) after this many frames, 0 for never
    pub frame_limit: u64,
}

impl Default for VirtualBusConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            frame_limit: 0,
        }
    }
}

/// Complete acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub bus: BusConfig,
    pub schema: SchemaConfig,
    pub logging: LogFileConfig,
    pub acquisition: AcquisitionConfig,
    pub virtual_bus: VirtualBusConfig,
}

impl AppConfig {
    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CanLogError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            CanLogError::Config(msg) => CanLogError::Config(format!("{:?}: {}", path, msg)),
            other => other,
        })
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| CanLogError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, returning defaults if it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save configuration to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| CanLogError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            CanLogError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject settings the acquisition loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.logging.rotation_period_secs == 0 {
            return Err(CanLogError::Config(
                "logging.rotation_period_secs must be at least 1".to_string(),
            ));
        }
        if self.logging.base_name.trim().is_empty() {
            return Err(CanLogError::Config(
                "logging.base_name must not be empty".to_string(),
            ));
        }
        if self
            .logging
            .base_name
            .contains(|c| c == '/' || c == '\\')
        {
            return Err(CanLogError::Config(
                "logging.base_name must not contain path separators".to_string(),
            ));
        }
        if self.acquisition.receive_timeout_ms == 0 {
            return Err(CanLogError::Config(
                "acquisition.receive_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref schema) = cli.schema {
            self.schema.path = schema.clone();
        }
        if let Some(secs) = cli.rotation_secs {
            self.logging.rotation_period_secs = secs;
        }
        if cli.use_virtual_bus {
            self.bus.kind = BusKind::Virtual;
        }
        if let Some(ref channel) = cli.channel {
            self.bus.kind = BusKind::Socketcan;
            self.bus.channel = channel.clone();
        }
    }
}

// ==================== App State ====================

/// Persistent application state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    /// Version for future migration support
    #[serde(default = "default_app_state_version")]
    pub version: u32,

    /// Output directory confirmed in the previous run
    #[serde(default)]
    pub last_output_dir: Option<PathBuf>,
}

fn default_app_state_version() -> u32 {
    1
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: 1,
            last_output_dir: None,
        }
    }
}

impl AppState {
    /// Load app state from the default location
    pub fn load() -> Result<Self> {
        let path = app_state_path().ok_or_else(|| {
            CanLogError::Config("Could not determine app state path".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| CanLogError::Config(format!("Failed to read app state: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| CanLogError::Config(format!("Failed to parse app state: {}", e)))
    }

    /// Load app state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load app state, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save app state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        let path = dir.join(APP_STATE_FILE);

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CanLogError::Config(format!("Failed to serialize app state: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| CanLogError::Config(format!("Failed to write app state: {}", e)))
    }

    /// Remember the directory the operator picked
    pub fn remember_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.last_output_dir = Some(dir.into());
    }

    /// Last output directory, if it still exists
    pub fn last_output_dir(&self) -> Option<&Path> {
        self.last_output_dir
            .as_deref()
            .filter(|p| p.is_dir())
    }
}
