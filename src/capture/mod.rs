//! Capture source boundary
//!
//! Frame acquisition is an external collaborator: the pipeline only needs to
//! open a live device or a file, optionally apply a resolution and frame
//! rate, and read frames one at a time. This module defines that interface
//! and ships two reference sources.
//!
//! # Components
//!
//! - [`CaptureSource`] - An open source yielding frames
//! - [`CaptureOpener`] - Opens devices and files for a pipeline run
//! - [`CaptureBackend`] - Device API selector
//! - [`synthetic::SyntheticSource`] - Test-pattern generator standing in for a device
//! - [`ppm::PpmFileSource`] - Playback of concatenated binary PPM images
//!
//! # Empty reads
//!
//! `read_frame` returning `Ok(None)` means "no frame this time" (a transient
//! device hiccup, or end of file). The pipeline treats it, and read errors,
//! as a skipped iteration rather than a fatal condition.

pub mod ppm;
pub mod synthetic;

pub use ppm::PpmFileSource;
pub use synthetic::{SyntheticPattern, SyntheticSource};

use crate::error::{MediaGraphError, Result};
use crate::types::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Device API used to open a live capture device
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum CaptureBackend {
    /// Let the platform choose
    #[default]
    Any,
    V4l2,
    DirectShow,
    MediaFoundation,
    AvFoundation,
    Gstreamer,
    Ffmpeg,
}

impl CaptureBackend {
    /// Map a numeric API identifier (as used by common capture libraries)
    pub fn from_api_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(CaptureBackend::Any),
            200 => Some(CaptureBackend::V4l2),
            700 => Some(CaptureBackend::DirectShow),
            1200 => Some(CaptureBackend::AvFoundation),
            1400 => Some(CaptureBackend::MediaFoundation),
            1800 => Some(CaptureBackend::Gstreamer),
            1900 => Some(CaptureBackend::Ffmpeg),
            _ => None,
        }
    }

    /// Numeric API identifier
    pub fn api_id(&self) -> i32 {
        match self {
            CaptureBackend::Any => 0,
            CaptureBackend::V4l2 => 200,
            CaptureBackend::DirectShow => 700,
            CaptureBackend::AvFoundation => 1200,
            CaptureBackend::MediaFoundation => 1400,
            CaptureBackend::Gstreamer => 1800,
            CaptureBackend::Ffmpeg => 1900,
        }
    }

    /// Resolve `Any` to the backend that works best on this platform
    ///
    /// On Windows, Media Foundation is unreliable for webcams, so `Any`
    /// selects DirectShow there.
    pub fn resolve_for_platform(self) -> Self {
        if cfg!(windows) && self == CaptureBackend::Any {
            CaptureBackend::DirectShow
        } else {
            self
        }
    }
}

impl fmt::Display for CaptureBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureBackend::Any => "any",
            CaptureBackend::V4l2 => "v4l2",
            CaptureBackend::DirectShow => "dshow",
            CaptureBackend::MediaFoundation => "msmf",
            CaptureBackend::AvFoundation => "avfoundation",
            CaptureBackend::Gstreamer => "gstreamer",
            CaptureBackend::Ffmpeg => "ffmpeg",
        };
        write!(f, "{}", name)
    }
}

/// An open frame source
///
/// Owned and used by a single pipeline worker thread.
#[cfg_attr(test, mockall::automock)]
pub trait CaptureSource: Send {
    /// Read the next frame, or `None` if no frame is available right now
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Request a capture resolution
    fn set_resolution(&mut self, width: u32, height: u32) -> Result<()>;

    /// Request a capture frame rate
    fn set_fps(&mut self, fps: u32) -> Result<()>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Opens capture sources for pipeline runs
pub trait CaptureOpener: Send + Sync {
    /// Open a live device
    fn open_device(&self, device_id: i32, backend: CaptureBackend) -> Result<Box<dyn CaptureSource>>;

    /// Open a file for playback
    fn open_file(&self, path: &Path) -> Result<Box<dyn CaptureSource>>;
}

/// Default opener: devices are synthetic pattern generators, files are PPM streams
#[derive(Debug, Clone, Default)]
pub struct DefaultCaptureOpener {
    /// Pattern used for every opened device
    pub pattern: SyntheticPattern,
}

impl CaptureOpener for DefaultCaptureOpener {
    fn open_device(&self, device_id: i32, backend: CaptureBackend) -> Result<Box<dyn CaptureSource>> {
        if device_id < 0 {
            return Err(MediaGraphError::Device(format!(
                "no capture device with id {} ({})",
                device_id, backend
            )));
        }
        tracing::debug!("Opening synthetic device {} via {}", device_id, backend);
        Ok(Box::new(SyntheticSource::new(
            synthetic::DEFAULT_WIDTH,
            synthetic::DEFAULT_HEIGHT,
            self.pattern,
        )))
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn CaptureSource>> {
        Ok(Box::new(PpmFileSource::open(path)?))
    }
}
