//! Configuration module for the Dendron streaming core
//!
//! The whole configuration is one explicit [`DendronConfig`] value handed to
//! the session at construction. Nothing reads settings from global state.
//!
//! # File location
//!
//! The configuration is stored as TOML in the platform config directory:
//! - **Linux**: `~/.config/dev.medialab.dendron/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.medialab.dendron/config.toml`
//! - **Windows**: `%APPDATA%\dev.medialab.dendron\config.toml`
//!
//! # Recognized keys
//!
//! ```toml
//! [data]
//! path = "/home/user"        # directory for CSV recordings
//!
//! [osc]
//! host = "127.0.0.1"
//! path = "/dendron"          # OSC address pattern
//! port = 5000
//!
//! [scope]
//! capacity = 1024
//! channels = 6
//! render_division = 4
//!
//! [session]
//! broadcast_requires_streaming = false
//! transport_queue_size = 1024
//! command_queue_size = 64
//! ```
//!
//! Every section and key is optional; missing values take their defaults.

use crate::error::{DendronError, Result};
use crate::protocol::CHANNEL_COUNT;
use crate::scope::{DEFAULT_CAPACITY, DEFAULT_DISPLAY_CHANNELS, DEFAULT_RENDER_DIVISION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config and data directories
pub const APP_ID: &str = "dev.medialab.dendron";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default OSC address pattern
pub const DEFAULT_OSC_PATH: &str = "/dendron";

/// Default OSC destination port
pub const DEFAULT_OSC_PORT: u16 = 5000;

/// Default OSC destination host
pub const DEFAULT_OSC_HOST: &str = "127.0.0.1";

/// Default bound of the transport event queue
pub const DEFAULT_TRANSPORT_QUEUE_SIZE: usize = 1024;

/// Default bound of the control command queue
pub const DEFAULT_COMMAND_QUEUE_SIZE: usize = 64;

// ==================== Directories ====================

/// Directory holding `config.toml`
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Path of the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Application data directory (log files)
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        DendronError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            DendronError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

fn default_data_path() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

// ==================== Sections ====================

/// Where recordings are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory for CSV recordings
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

/// OSC broadcast destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    /// Destination host name or address
    pub host: String,
    /// OSC address pattern every message is sent to
    pub path: String,
    /// Destination UDP port
    pub port: u16,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OSC_HOST.to_string(),
            path: DEFAULT_OSC_PATH.to_string(),
            port: DEFAULT_OSC_PORT,
        }
    }
}

/// Scope buffer shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Samples per trace
    pub capacity: usize,
    /// Number of decoded channels that are plotted
    pub channels: usize,
    /// Pushes between render notifications
    pub render_division: usize,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            channels: DEFAULT_DISPLAY_CHANNELS,
            render_division: DEFAULT_RENDER_DIVISION,
        }
    }
}

/// Session behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Reject broadcast toggles while the device is not streaming.
    ///
    /// Off by default: broadcasting can be armed before streaming starts,
    /// while recording can only be toggled during streaming.
    pub broadcast_requires_streaming: bool,
    /// Bound of the transport-to-backend byte chunk queue
    pub transport_queue_size: usize,
    /// Bound of the frontend-to-backend command queue
    pub command_queue_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            broadcast_requires_streaming: false,
            transport_queue_size: DEFAULT_TRANSPORT_QUEUE_SIZE,
            command_queue_size: DEFAULT_COMMAND_QUEUE_SIZE,
        }
    }
}

// ==================== Dendron Config ====================

/// Complete configuration for one streaming session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DendronConfig {
    /// Recording settings
    pub data: DataConfig,
    /// Broadcast settings
    pub osc: OscConfig,
    /// Scope buffer settings
    pub scope: ScopeConfig,
    /// Session behaviour
    pub session: SessionConfig,
}

impl DendronConfig {
    /// Load from the default location, returning defaults if the file is absent
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            DendronError::Config("Could not determine config path".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Load and validate a specific TOML file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DendronError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| DendronError::Serialization(format!("Failed to parse config: {}", e)))?;

        // An empty path means "unset", same as a missing key
        if config.data.path.as_os_str().is_empty() {
            config.data.path = default_data_path();
        }
        Ok(config)
    }

    /// Serialize to TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DendronError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        let dir = config_dir().ok_or_else(|| {
            DendronError::Config("Could not determine config directory".to_string())
        })?;
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                DendronError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
        self.save_to(dir.join(CONFIG_FILE))
    }

    /// Save to a specific file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml()?).map_err(|e| {
            DendronError::Config(format!("Failed to write {}: {}", path.display(), e))
        })?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Check ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.osc.port == 0 {
            return Err(DendronError::Config("osc.port must not be 0".to_string()));
        }
        if !self.osc.path.starts_with('/') {
            return Err(DendronError::Config(format!(
                "osc.path must start with '/', got {:?}",
                self.osc.path
            )));
        }
        if self.osc.host.trim().is_empty() {
            return Err(DendronError::Config("osc.host must not be empty".to_string()));
        }
        if self.scope.capacity == 0 {
            return Err(DendronError::Config("scope.capacity must be at least 1".to_string()));
        }
        if self.scope.channels == 0 || self.scope.channels > CHANNEL_COUNT {
            return Err(DendronError::Config(format!(
                "scope.channels must be between 1 and {}",
                CHANNEL_COUNT
            )));
        }
        if self.scope.render_division == 0 {
            return Err(DendronError::Config(
                "scope.render_division must be at least 1".to_string(),
            ));
        }
        if self.session.transport_queue_size == 0 || self.session.command_queue_size == 0 {
            return Err(DendronError::Config(
                "queue sizes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ==================== Tests ====================
