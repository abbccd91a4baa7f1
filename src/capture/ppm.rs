//! File playback from a stream of binary PPM images
//!
//! The file is a plain concatenation of P6 images, the format produced by
//! e.g. `ffmpeg -i input.mp4 -f image2pipe -vcodec ppm frames.ppm`. Each
//! image becomes one RGB frame; end of file yields no frame.

use super::CaptureSource;
use crate::error::{MediaGraphError, Result};
use crate::types::{Frame, PixelFormat};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Largest accepted image, 8192x8192 RGB
pub const MAX_FRAME_BYTES: usize = 8192 * 8192 * 3;

/// Reads frames from a concatenated PPM stream
pub struct PpmFileSource {
    path: PathBuf,
    reader: Box<dyn BufRead + Send>,
    frames_read: usize,
    finished: bool,
}

impl PpmFileSource {
    /// Open a PPM stream file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            MediaGraphError::Device(format!("failed to open {}: {}", path.display(), e))
        })?;
        Ok(Self::from_reader(path, BufReader::new(file)))
    }

    /// Read PPM images from any buffered reader
    pub fn from_reader(path: &Path, reader: impl BufRead + Send + 'static) -> Self {
        Self {
            path: path.to_path_buf(),
            reader: Box::new(reader),
            frames_read: 0,
            finished: false,
        }
    }

    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    fn malformed(&self, message: impl Into<String>) -> MediaGraphError {
        MediaGraphError::Device(format!(
            "{} (frame {}): {}",
            self.path.display(),
            self.frames_read,
            message.into()
        ))
    }

    /// Next byte, or `None` at end of file
    fn next_byte(&mut self) -> Result<Option<u8>> {
        let buf = self.reader.fill_buf()?;
        let Some(&byte) = buf.first() else {
            return Ok(None);
        };
        self.reader.consume(1);
        Ok(Some(byte))
    }

    /// Next whitespace-delimited header token, skipping `#` comments
    fn header_token(&mut self) -> Result<Option<String>> {
        let mut token = String::new();
        loop {
            let Some(byte) = self.next_byte()? else {
                return Ok(if token.is_empty() { None } else { Some(token) });
            };
            match byte {
                b'#' if token.is_empty() => {
                    while let Some(b) = self.next_byte()? {
                        if b == b'\n' {
                            break;
                        }
                    }
                }
                b if b.is_ascii_whitespace() => {
                    if !token.is_empty() {
                        return Ok(Some(token));
                    }
                }
                b => token.push(b as char),
            }
        }
    }

    fn header_number(&mut self, what: &str) -> Result<u32> {
        let token = self
            .header_token()?
            .ok_or_else(|| self.malformed(format!("truncated header, missing {}", what)))?;
        token
            .parse::<u32>()
            .map_err(|_| self.malformed(format!("invalid {} '{}'", what, token)))
    }

    fn read_image(&mut self) -> Result<Option<Frame>> {
        let Some(magic) = self.header_token()? else {
            return Ok(None);
        };
        if magic != "P6" {
            return Err(self.malformed(format!("unsupported magic '{}'", magic)));
        }

        // the single whitespace after maxval is consumed by header_token
        let width = self.header_number("width")?;
        let height = self.header_number("height")?;
        let maxval = self.header_number("maxval")?;
        if maxval == 0 || maxval > 255 {
            return Err(self.malformed(format!("unsupported maxval {}", maxval)));
        }

        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .filter(|&n| n <= MAX_FRAME_BYTES)
            .ok_or_else(|| self.malformed(format!("frame size {}x{} too large", width, height)))?;
        let mut data = vec![0u8; len];
        if let Err(e) = self.reader.read_exact(&mut data) {
            return Err(self.malformed(format!("truncated pixel data: {}", e)));
        }

        self.frames_read += 1;
        Frame::new(width, height, PixelFormat::Rgb8, data).map(Some)
    }
}

impl CaptureSource for PpmFileSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        // any malformed image leaves the reader mid-stream, so playback ends
        let frame = self.read_image();
        if !matches!(frame, Ok(Some(_))) {
            self.finished = true;
        }
        frame
    }

    fn set_resolution(&mut self, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    fn set_fps(&mut self, _fps: u32) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        format!("ppm file {}", self.path.display())
    }
}
