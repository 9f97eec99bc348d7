use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::ReadError(e.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::ParseError(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub notice: NoticeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Player id this application would publish under; its own events are ignored.
    #[serde(default = "default_app_id")]
    pub app_id: String,
}

fn default_app_id() -> String {
    "island".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_artwork_size")]
    pub artwork_size: u32,
    #[serde(default = "default_true")]
    pub fetch_remote_artwork: bool,
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_artwork_size() -> u32 {
    150
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_max_payload")]
    pub max_payload_bytes: usize,
}

fn default_max_payload() -> usize {
    1_000_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayBackend {
    Gtk,
    Headless,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_backend")]
    pub backend: OverlayBackend,
    #[serde(default = "default_true")]
    pub start_on_launch: bool,
    #[serde(default = "default_offset_y")]
    pub offset_y: i32,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default = "default_compact_width")]
    pub compact_width: i32,
    #[serde(default = "default_compact_height")]
    pub compact_height: i32,
    #[serde(default = "default_expanded_width")]
    pub expanded_width: i32,
    #[serde(default = "default_expanded_height")]
    pub expanded_height: i32,
}

fn default_backend() -> OverlayBackend {
    OverlayBackend::Gtk
}

fn default_offset_y() -> i32 {
    50
}

fn default_opacity() -> f64 {
    0.95
}

fn default_compact_width() -> i32 {
    200
}

fn default_compact_height() -> i32 {
    45
}

fn default_expanded_width() -> i32 {
    350
}

fn default_expanded_height() -> i32 {
    180
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_notice_title")]
    pub title: String,
}

fn default_notice_title() -> String {
    "Island active".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            observer: ObserverConfig::default(),
            relay: RelayConfig::default(),
            overlay: OverlayConfig::default(),
            notice: NoticeConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            artwork_size: default_artwork_size(),
            fetch_remote_artwork: default_true(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            backend: default_backend(),
            start_on_launch: default_true(),
            offset_y: default_offset_y(),
            opacity: default_opacity(),
            compact_width: default_compact_width(),
            compact_height: default_compact_height(),
            expanded_width: default_expanded_width(),
            expanded_height: default_expanded_height(),
        }
    }
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            title: default_notice_title(),
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# island Configuration File
# All options are shown below with their default values.
# Uncomment and modify any option you want to change.

[general]
# Player id of this application; media events from it are ignored
app_id = "island"

[observer]
# How often the session bus is scanned for media players, in milliseconds
poll_interval_ms = 1000
# Artwork is scaled to a square of this many pixels before it is relayed
artwork_size = 150
# Download http(s) artwork URLs advertised by players
fetch_remote_artwork = true

[relay]
# Largest message the relay accepts; oversized updates are resent without artwork
max_payload_bytes = 1000000

[overlay]
# Enable the floating pill
enabled = true
# Overlay backend: "gtk" (floating window) or "headless" (log only)
backend = "gtk"
# Show the pill as soon as the daemon starts (otherwise wait for `island start`)
start_on_launch = true
# Distance from the top edge of the screen in pixels
offset_y = 50
# Window opacity (0.0 to 1.0)
opacity = 0.95
# Pill size in pixels
compact_width = 200
compact_height = 45
expanded_width = 350
expanded_height = 180

[notice]
# Post a low-urgency desktop notification while the pill is running
enabled = true
title = "Island active"
"#;

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Config file not found at {:?}, creating default config file", config_path);
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn create_default_config(config_path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::ReadError(format!("Failed to create config directory: {}", e)))?;
        }

        fs::write(config_path, DEFAULT_CONFIG)
            .map_err(|e| ConfigError::ReadError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Created default config file at {:?}", config_path);
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::ReadError("Could not find config directory".to_string()))?;
        Ok(config_dir.join("island").join("config.toml"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.observer.artwork_size == 0 {
            return Err(ConfigError::InvalidValue("observer.artwork_size must be positive".to_string()));
        }
        if self.observer.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue("observer.poll_interval_ms must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.overlay.opacity) {
            return Err(ConfigError::InvalidValue(format!(
                "overlay.opacity must be between 0.0 and 1.0, got {}",
                self.overlay.opacity
            )));
        }
        Ok(())
    }
}
