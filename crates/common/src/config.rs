//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{FramecastError, FramecastResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where exports land when no folder is given.
    pub exports_dir: PathBuf,

    /// Export loop and encoder defaults.
    #[serde(default)]
    pub export: ExportDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Frames the source may keep cached while an export runs.
    pub cache_max_frames: usize,

    /// Approximate number of progress events per export, regardless of length.
    pub progress_target_events: u64,

    /// Maximum seconds between progress events on slow exports.
    pub liveness_interval_secs: f64,

    /// Capacity of the progress event channel.
    pub channel_capacity: usize,

    /// Default output width.
    pub width: u32,

    /// Default output height.
    pub height: u32,

    /// Default output frame rate.
    pub fps: u32,

    /// Default video codec passed to the encoder.
    pub video_codec: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "framecast_export=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exports_dir: default_exports_dir(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            cache_max_frames: 500,
            progress_target_events: 1000,
            liveness_interval_secs: 1.0,
            channel_capacity: 64,
            width: 1920,
            height: 1080,
            fps: 30,
            video_codec: "libx264".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> FramecastResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &std::path::Path) -> FramecastResult<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, json)?;
        Ok(())
    }

    /// Reject values the export loop cannot work with.
    pub fn validate(&self) -> FramecastResult<()> {
        let export = &self.export;
        if export.width == 0 || export.height == 0 {
            return Err(FramecastError::config(format!(
                "export size must be non-zero, got {}x{}",
                export.width, export.height
            )));
        }
        if export.fps == 0 {
            return Err(FramecastError::config("export fps must be at least 1"));
        }
        if export.progress_target_events == 0 {
            return Err(FramecastError::config(
                "progress_target_events must be at least 1",
            ));
        }
        if export.liveness_interval_secs.is_nan() || export.liveness_interval_secs <= 0.0 {
            return Err(FramecastError::config(
                "liveness_interval_secs must be positive",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("framecast").join("config.json")
}

/// The user's home directory, or `/tmp` when `HOME` is unset.
pub fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

fn default_exports_dir() -> PathBuf {
    home_dir()
}
