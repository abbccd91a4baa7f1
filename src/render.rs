//! Overlay presentation
//!
//! When a pipeline runs with the overlay enabled, every rendered frame polled
//! from the graph is handed to a [`RenderSurface`]. The surface is created on
//! the worker thread at the start of a run and closed when the run ends.
//!
//! Two surfaces ship with the crate:
//!
//! - [`NullSurface`] - Discards frames, for headless runs
//! - [`ChannelSurface`] - Forwards frames over a bounded channel to whoever
//!   draws them, dropping frames rather than stalling the pipeline

use crate::error::Result;
use crate::types::Frame;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Title used for overlay windows
pub const WINDOW_TITLE: &str = "MediaGraph";

/// A place rendered frames are shown
pub trait RenderSurface: Send {
    /// Show one frame (BGR)
    fn present(&mut self, frame: &Frame) -> Result<()>;

    /// Tear the surface down
    fn close(&mut self) {}
}

/// Creates a surface for each overlay-enabled run
pub trait SurfaceFactory: Send + Sync {
    fn create(&self, title: &str) -> Result<Box<dyn RenderSurface>>;
}

/// Surface that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn present(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }
}

impl SurfaceFactory for NullSurface {
    fn create(&self, _title: &str) -> Result<Box<dyn RenderSurface>> {
        Ok(Box::new(NullSurface))
    }
}

/// Surface forwarding frames to a receiver
///
/// Frames that do not fit in the channel are counted and dropped.
pub struct ChannelSurface {
    tx: Sender<Arc<Frame>>,
    dropped: Arc<AtomicU64>,
}

impl RenderSurface for ChannelSurface {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        match self.tx.try_send(Arc::new(frame.clone())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // nobody is watching any more; keep the pipeline running
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

/// Factory handing out [`ChannelSurface`]s that share one channel
#[derive(Clone)]
pub struct ChannelSurfaceFactory {
    tx: Sender<Arc<Frame>>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSurfaceFactory {
    /// Create a factory and the receiving end of its channel
    pub fn new(capacity: usize) -> (Self, Receiver<Arc<Frame>>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Frames dropped because the receiver fell behind or went away
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SurfaceFactory for ChannelSurfaceFactory {
    fn create(&self, title: &str) -> Result<Box<dyn RenderSurface>> {
        tracing::debug!("Opening channel surface '{}'", title);
        Ok(Box::new(ChannelSurface {
            tx: self.tx.clone(),
            dropped: self.dropped.clone(),
        }))
    }
}
