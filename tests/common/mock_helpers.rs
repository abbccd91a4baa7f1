//! Capture collaborators for integration tests

use mediagraph_rs::capture::{
    CaptureBackend, CaptureOpener, CaptureSource, PpmFileSource, SyntheticPattern, SyntheticSource,
};
use mediagraph_rs::{MediaGraphError, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// What a pipeline asked the opener for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenRequest {
    Device { id: i32, backend: CaptureBackend },
    File(PathBuf),
}

/// Opener producing a fresh synthetic device per run
///
/// Every device yields `frame_limit` frames (after the listed empty reads)
/// and nothing afterwards. Files are opened as real PPM streams.
pub struct SyntheticOpener {
    width: u32,
    height: u32,
    pattern: SyntheticPattern,
    frame_limit: Option<usize>,
    empty_reads: Vec<usize>,
    requests: Mutex<Vec<OpenRequest>>,
}

impl SyntheticOpener {
    pub fn new(frame_limit: usize) -> Self {
        Self {
            width: 16,
            height: 8,
            pattern: SyntheticPattern::MovingDot,
            frame_limit: Some(frame_limit),
            empty_reads: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Devices that never run out of frames
    pub fn unlimited() -> Self {
        Self {
            frame_limit: None,
            ..Self::new(0)
        }
    }

    pub fn with_empty_reads(mut self, reads: &[usize]) -> Self {
        self.empty_reads = reads.to_vec();
        self
    }

    pub fn requests(&self) -> Vec<OpenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl CaptureOpener for SyntheticOpener {
    fn open_device(&self, id: i32, backend: CaptureBackend) -> Result<Box<dyn CaptureSource>> {
        self.requests
            .lock()
            .unwrap()
            .push(OpenRequest::Device { id, backend });
        if id < 0 {
            return Err(MediaGraphError::Device(format!("no device {}", id)));
        }
        let mut source = SyntheticSource::new(self.width, self.height, self.pattern)
            .with_empty_reads(&self.empty_reads);
        if let Some(limit) = self.frame_limit {
            source = source.with_frame_limit(limit);
        }
        Ok(Box::new(source))
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn CaptureSource>> {
        self.requests
            .lock()
            .unwrap()
            .push(OpenRequest::File(path.to_path_buf()));
        Ok(Box::new(PpmFileSource::open(path)?))
    }
}

/// Binary PPM image with every pixel set to `rgb`
pub fn ppm_frame(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut bytes = format!("P6\n{} {}\n255\n", width, height).into_bytes();
    for _ in 0..width * height {
        bytes.extend_from_slice(&rgb);
    }
    bytes
}
