//! Synthetic capture device
//!
//! Generates BGR test-pattern frames so a pipeline can run without camera
//! hardware. Frame count can be limited, individual reads can be made to
//! come back empty, and a requested frame rate paces the reads.
//!
//! # Patterns
//!
//! - [`SyntheticPattern::Gradient`] - Horizontal/vertical colour ramp that scrolls per frame
//! - [`SyntheticPattern::MovingDot`] - A white dot sweeping across a black frame
//! - [`SyntheticPattern::Solid`] - A constant colour

use super::CaptureSource;
use crate::error::{MediaGraphError, Result};
use crate::types::{Frame, PixelFormat};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Default width of a synthetic device
pub const DEFAULT_WIDTH: u32 = 320;
/// Default height of a synthetic device
pub const DEFAULT_HEIGHT: u32 = 240;

/// Pattern for generating frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyntheticPattern {
    #[default]
    Gradient,
    MovingDot,
    /// Constant BGR colour
    Solid([u8; 3]),
}

/// Test-pattern frame generator
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    pattern: SyntheticPattern,
    /// Stop producing frames after this many
    frame_limit: Option<usize>,
    /// Zero-based read indices that return no frame
    empty_reads: HashSet<usize>,
    /// Minimum interval between frames
    frame_interval: Option<Duration>,
    last_frame_at: Option<Instant>,
    reads: usize,
    produced: usize,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, pattern: SyntheticPattern) -> Self {
        Self {
            width,
            height,
            pattern,
            frame_limit: None,
            empty_reads: HashSet::new(),
            frame_interval: None,
            last_frame_at: None,
            reads: 0,
            produced: 0,
        }
    }

    /// Produce at most `limit` frames, then report no frame forever
    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Make the given zero-based read calls come back empty
    pub fn with_empty_reads(mut self, reads: &[usize]) -> Self {
        self.empty_reads.extend(reads.iter().copied());
        self
    }

    /// Number of `read_frame` calls so far
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Number of frames produced so far
    pub fn produced(&self) -> usize {
        self.produced
    }

    fn render(&self, index: usize) -> Frame {
        let mut frame = Frame::blank(self.width, self.height, PixelFormat::Bgr8);
        let (w, h) = (self.width as usize, self.height as usize);
        if w == 0 || h == 0 {
            return frame;
        }
        let stride = frame.stride();
        let data = frame.data_mut();

        match self.pattern {
            SyntheticPattern::Gradient => {
                for y in 0..h {
                    for x in 0..w {
                        let offset = y * stride + x * 3;
                        data[offset] = ((x + index) * 255 / w) as u8;
                        data[offset + 1] = (y * 255 / h) as u8;
                        data[offset + 2] = (index % 256) as u8;
                    }
                }
            }
            SyntheticPattern::MovingDot => {
                let x = index % w;
                let y = (index / w) % h;
                let offset = y * stride + x * 3;
                data[offset..offset + 3].copy_from_slice(&[255, 255, 255]);
            }
            SyntheticPattern::Solid(color) => {
                for px in data.chunks_exact_mut(3) {
                    px.copy_from_slice(&color);
                }
            }
        }
        frame
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_frame_at) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl CaptureSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let read = self.reads;
        self.reads += 1;

        if self.empty_reads.contains(&read) {
            return Ok(None);
        }
        if self.frame_limit.is_some_and(|limit| self.produced >= limit) {
            return Ok(None);
        }

        self.pace();
        let frame = self.render(self.produced);
        self.produced += 1;
        Ok(Some(frame))
    }

    fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(MediaGraphError::Device(format!(
                "invalid resolution {}x{}",
                width, height
            )));
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn set_fps(&mut self, fps: u32) -> Result<()> {
        if fps == 0 {
            return Err(MediaGraphError::Device("invalid frame rate 0".to_string()));
        }
        self.frame_interval = Some(Duration::from_micros(1_000_000 / fps as u64));
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "synthetic {:?} {}x{}",
            self.pattern, self.width, self.height
        )
    }
}
