//! Configuration module for mediagraph-rs
//!
//! This module handles configuration for the context and its pipelines:
//! - [`ContextConfig`] - resource root and logging
//! - [`PipelineConfig`] - graph resources, capture source, overlay, observers
//! - [`AppConfig`] - both, as stored in a TOML file
//!
//! # Config Location
//!
//! When no path is given, the binary looks for `mediagraph.toml` in the
//! platform config directory under `dev.hxyulin.mediagraph-rs`:
//!
//! - **Linux**: `~/.config/dev.hxyulin.mediagraph-rs/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.mediagraph-rs/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.mediagraph-rs\`
//!
//! # Example
//!
//! ```toml
//! [context]
//! resource_root = "/opt/graphs"
//!
//! [pipeline]
//! graph = "face_landmarks.pbtxt;face_overlay.pbtxt"
//! overlay = true
//! observers = ["multi_face_landmarks"]
//!
//! [pipeline.capture.device]
//! id = 0
//! backend = "v4l2"
//! width = 1280
//! height = 720
//! fps = 30
//! ```

use crate::capture::CaptureBackend;
use crate::error::{MediaGraphError, Result};
use crate::logging::DEFAULT_LOG_FILTER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.hxyulin.mediagraph-rs";

/// Config filename
pub const CONFIG_FILE: &str = "mediagraph.toml";

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

// ==================== Capture ====================

/// Live device parameters
///
/// Resolution and frame rate are only applied when positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device index
    pub id: i32,
    /// Device API
    pub backend: CaptureBackend,
    /// Requested width (0 = device default)
    pub width: i32,
    /// Requested height (0 = device default)
    pub height: i32,
    /// Requested frame rate (0 = device default)
    pub fps: i32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: 0,
            backend: CaptureBackend::Any,
            width: 0,
            height: 0,
            fps: 0,
        }
    }
}

impl DeviceConfig {
    /// Resolution to apply, if one was requested
    pub fn requested_resolution(&self) -> Option<(u32, u32)> {
        if self.width > 0 && self.height > 0 {
            Some((self.width as u32, self.height as u32))
        } else {
            None
        }
    }

    /// Frame rate to apply, if one was requested
    pub fn requested_fps(&self) -> Option<u32> {
        if self.fps > 0 {
            Some(self.fps as u32)
        } else {
            None
        }
    }
}

/// Capture source selection
///
/// A file path selects file playback; otherwise the device is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub device: DeviceConfig,
    pub file: Option<PathBuf>,
}

impl CaptureConfig {
    /// Whether a live device (rather than a file) is used
    pub fn uses_device(&self) -> bool {
        self.file.is_none()
    }
}

// ==================== Pipeline ====================

/// Configuration of one pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `;`-delimited graph configuration resources, concatenated in order
    pub graph: String,
    /// Capture source
    pub capture: CaptureConfig,
    /// Poll and present the rendered output
    pub overlay: bool,
    /// Output streams to observe
    pub observers: Vec<String>,
}

// ==================== Context ====================

/// Configuration of the process-level context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Prefix for relative resource identifiers
    pub resource_root: PathBuf,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Directory for rolling log files
    pub log_dir: Option<PathBuf>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            resource_root: PathBuf::new(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: None,
        }
    }
}

// ==================== App Config ====================

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub context: ContextConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MediaGraphError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Load from the default location, or defaults if there is none
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.pipeline.capture.uses_device());
        assert!(!config.pipeline.overlay);
        assert_eq!(config.context.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.pipeline.capture.device.requested_resolution(), None);
        assert_eq!(config.pipeline.capture.device.requested_fps(), None);
    }

    #[test]
    fn test_parse_full_file() {
        let config = AppConfig::from_toml(
            r#"
[context]
resource_root = "/opt/graphs"

[pipeline]
graph = "a.pbtxt;b.pbtxt"
overlay = true
observers = ["x", "y"]

[pipeline.capture.device]
id = 2
backend = "direct_show"
width = 640
height = 480
fps = 30
"#,
        )
        .unwrap();

        assert_eq!(config.context.resource_root, PathBuf::from("/opt/graphs"));
        assert_eq!(config.pipeline.graph, "a.pbtxt;b.pbtxt");
        assert!(config.pipeline.overlay);
        assert_eq!(config.pipeline.observers, vec!["x", "y"]);
        let device = &config.pipeline.capture.device;
        assert_eq!(device.backend, CaptureBackend::DirectShow);
        assert_eq!(device.requested_resolution(), Some((640, 480)));
        assert_eq!(device.requested_fps(), Some(30));
    }

    #[test]
    fn test_file_capture_selects_playback() {
        let config = AppConfig::from_toml(
            r#"
[pipeline.capture]
file = "clip.ppm"
"#,
        )
        .unwrap();
        assert!(!config.pipeline.capture.uses_device());
    }

    #[test]
    fn test_partial_resolution_is_ignored() {
        let device = DeviceConfig {
            width: 640,
            height: 0,
            ..Default::default()
        };
        assert_eq!(device.requested_resolution(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = AppConfig::default();
        config.pipeline.graph = "graph.pbtxt".to_string();
        config.pipeline.observers.push("pose_landmarks".to_string());
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(AppConfig::from_toml("[pipeline\n").is_err());
    }
}
