//! Core data types for mediagraph-rs
//!
//! This module contains the data structures that cross the pipeline's
//! boundaries: captured frames, graph timestamps and output packets.
//!
//! # Main Types
//!
//! - [`PixelFormat`] - Channel order of an interleaved 8-bit frame
//! - [`Frame`] - An owned, tightly packed image
//! - [`Timestamp`] - Microsecond graph timestamp
//! - [`Packet`] - A timestamped value delivered on a graph output stream
//! - [`Payload`] - The value carried by a packet

use crate::error::{MediaGraphError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Channel order of an interleaved 8-bit, 3-channel frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PixelFormat {
    /// Blue, green, red (capture devices and display surfaces)
    #[default]
    Bgr8,
    /// Red, green, blue (graph input layout)
    Rgb8,
}

impl PixelFormat {
    /// Number of bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        3
    }

    /// The format with red and blue swapped
    pub fn swapped(&self) -> PixelFormat {
        match self {
            PixelFormat::Bgr8 => PixelFormat::Rgb8,
            PixelFormat::Rgb8 => PixelFormat::Bgr8,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Bgr8 => write!(f, "BGR8"),
            PixelFormat::Rgb8 => write!(f, "RGB8"),
        }
    }
}

/// An owned image with rows packed without padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Frame {
    /// Create a frame from raw pixel data
    ///
    /// Fails if `data` does not hold exactly `width * height` pixels.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.bytes_per_pixel()));
        if expected != Some(data.len()) {
            return Err(MediaGraphError::Device(format!(
                "frame buffer holds {} bytes, {}x{} {} needs {}",
                data.len(),
                width,
                height,
                format,
                expected.map_or_else(|| "more than usize".to_string(), |n| n.to_string())
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Create a zero-filled frame
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            data: vec![0; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// True if the frame has no pixels
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Channel values of the pixel at (x, y) in the frame's own order
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * self.format.bytes_per_pixel();
        Some([self.data[offset], self.data[offset + 1], self.data[offset + 2]])
    }

    pub(crate) fn set_format(&mut self, format: PixelFormat) {
        self.format = format;
    }
}

/// Graph timestamp in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn from_micros(us: u64) -> Self {
        Timestamp(us)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// A normalized landmark produced by a graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Landmark {
    /// Horizontal position in [0, 1]
    pub x: f32,
    /// Vertical position in [0, 1]
    pub y: f32,
    /// Depth relative to the image plane
    pub z: f32,
    /// Confidence in [0, 1]
    pub visibility: f32,
}

/// The value carried by a [`Packet`]
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// An image, e.g. the rendered overlay
    Image(Arc<Frame>),
    /// A list of landmarks
    Landmarks(Vec<Landmark>),
    /// Free-form text
    Text(String),
}

impl Payload {
    /// Short kind name used in logs and snapshots
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Image(_) => "image",
            Payload::Landmarks(_) => "landmarks",
            Payload::Text(_) => "text",
        }
    }

    pub fn as_image(&self) -> Option<&Arc<Frame>> {
        match self {
            Payload::Image(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_landmarks(&self) -> Option<&[Landmark]> {
        match self {
            Payload::Landmarks(landmarks) => Some(landmarks),
            _ => None,
        }
    }
}

/// A timestamped value delivered on a graph output stream
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub timestamp: Timestamp,
    pub payload: Payload,
}

impl Packet {
    pub fn new(timestamp: Timestamp, payload: Payload) -> Self {
        Self { timestamp, payload }
    }
}
