//! Pipeline lifecycle
//!
//! A [`Pipeline`] couples a capture source, a graph and a set of observers,
//! and runs them on a dedicated worker thread.
//!
//! # States
//!
//! ```text
//! Idle --start()--> Running --stop() / run ends--> ShuttingDown --> Idle
//! ```
//!
//! - Configuration setters may be called in any state; changes made while a
//!   run is active are picked up by the next `start()`
//! - Observers can only be registered while `Idle`
//! - `start()` on a running pipeline stops the current run first
//! - `stop()` returns once the worker has exited and the graph is released
//!
//! # Example
//!
//! ```ignore
//! use mediagraph_rs::Context;
//!
//! let context = Context::new();
//! let mut pipeline = context.create_pipeline();
//! pipeline.set_graph_configuration("hand_tracking.pbtxt");
//! let landmarks = pipeline.register_observer("hand_landmarks")?;
//! pipeline.start()?;
//! // ... read `landmarks.latest()` from any thread ...
//! pipeline.stop();
//! ```

pub mod clock;
pub mod stats;
mod worker;

pub use clock::MonotonicClock;
pub use stats::{PipelineStats, StatsSnapshot};

use crate::capture::{CaptureBackend, CaptureOpener};
use crate::config::{CaptureConfig, DeviceConfig, PipelineConfig};
use crate::engine::GraphFactory;
use crate::error::{MediaGraphError, Result};
use crate::logging::Logger;
use crate::observer::Observer;
use crate::render::SurfaceFactory;
use crate::resource::ResourceLoader;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use worker::Worker;

/// Lifecycle state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Running = 1,
    ShuttingDown = 2,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Running,
            2 => PipelineState::ShuttingDown,
            _ => PipelineState::Idle,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Running => write!(f, "running"),
            PipelineState::ShuttingDown => write!(f, "shutting down"),
        }
    }
}

/// What a run is built from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSettings {
    /// `;`-delimited graph configuration resources
    pub graph: String,
    pub capture: CaptureConfig,
    pub overlay: bool,
}

/// Collaborators a pipeline gets from its [`Context`](crate::Context)
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) graph_factory: Arc<dyn GraphFactory>,
    pub(crate) capture_opener: Arc<dyn CaptureOpener>,
    pub(crate) surfaces: Arc<dyn SurfaceFactory>,
    pub(crate) resources: ResourceLoader,
    pub(crate) logger: Logger,
}

/// State shared between the owner and the worker
#[derive(Debug, Default)]
pub(crate) struct PipelineShared {
    state: AtomicU8,
    pub(crate) graph_alive: AtomicBool,
    pub(crate) stats: PipelineStats,
}

impl PipelineShared {
    pub(crate) fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// A capture → graph → observers pipeline with its own worker thread
pub struct Pipeline {
    settings: PipelineSettings,
    observers: Vec<Observer>,
    services: Services,
    run_flag: Arc<AtomicBool>,
    shared: Arc<PipelineShared>,
    worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub(crate) fn new(services: Services) -> Self {
        Self {
            settings: PipelineSettings::default(),
            observers: Vec::new(),
            services,
            run_flag: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(PipelineShared::default()),
            worker: None,
        }
    }

    // ==================== Configuration ====================

    /// Set the `;`-delimited list of graph configuration resources
    ///
    /// Takes effect on the next [`start`](Self::start).
    pub fn set_graph_configuration(&mut self, resources: impl Into<String>) {
        self.warn_if_running("graph configuration");
        self.settings.graph = resources.into();
    }

    /// Play frames from a file instead of a live device
    ///
    /// An empty path switches back to the device. Takes effect on the next
    /// [`start`](Self::start).
    pub fn set_capture_from_file(&mut self, path: impl Into<PathBuf>) {
        self.warn_if_running("capture file");
        let path = path.into();
        self.settings.capture.file = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
    }

    /// Set live device parameters
    ///
    /// Non-positive `width`/`height`/`fps` leave the device default in place.
    /// Ignored while a capture file is set. Takes effect on the next
    /// [`start`](Self::start).
    pub fn set_capture_params(
        &mut self,
        device_id: i32,
        backend: CaptureBackend,
        width: i32,
        height: i32,
        fps: i32,
    ) {
        self.warn_if_running("capture parameters");
        self.settings.capture.device = DeviceConfig {
            id: device_id,
            backend,
            width,
            height,
            fps,
        };
    }

    /// Enable presenting the graph's rendered output
    ///
    /// Takes effect on the next [`start`](Self::start).
    pub fn set_overlay(&mut self, overlay: bool) {
        self.warn_if_running("overlay");
        self.settings.overlay = overlay;
    }

    /// Apply a [`PipelineConfig`] and register its observers
    ///
    /// Fails like [`register_observer`](Self::register_observer) when the
    /// pipeline is not idle; settings are applied either way.
    pub fn configure(&mut self, config: &PipelineConfig) -> Result<Vec<Observer>> {
        self.set_graph_configuration(config.graph.clone());
        self.warn_if_running("capture source");
        self.settings.capture = config.capture.clone();
        self.set_overlay(config.overlay);
        config
            .observers
            .iter()
            .map(|name| self.register_observer(name))
            .collect()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Subscribe to a graph output stream
    ///
    /// Only allowed while idle. The same stream may be observed more than
    /// once; each observer is independent. Observers stay attached for one
    /// run and are released by the pipeline when it stops, so register them
    /// again before the next `start()`.
    pub fn register_observer(&mut self, stream: impl Into<String>) -> Result<Observer> {
        self.reap_finished_worker();
        let state = self.state();
        if state != PipelineState::Idle {
            return Err(MediaGraphError::InvalidState(format!(
                "cannot register an observer while {}",
                state
            )));
        }
        let observer = Observer::new(stream);
        self.observers.push(observer.clone());
        Ok(observer)
    }

    /// Observers held for the next or current run
    pub fn observers(&self) -> &[Observer] {
        &self.observers
    }

    // ==================== Lifecycle ====================

    /// Start a run on a new worker thread
    ///
    /// A run already in progress is stopped first. Everything that can go
    /// wrong inside the run is logged by the worker; the only error returned
    /// here is a failure to spawn the thread.
    pub fn start(&mut self) -> Result<()> {
        self.stop();
        self.services.logger.info("Starting pipeline");

        self.run_flag = Arc::new(AtomicBool::new(true));
        self.shared.set_state(PipelineState::Running);

        let worker = Worker {
            settings: self.settings.clone(),
            observers: self.observers.clone(),
            services: self.services.clone(),
            run_flag: self.run_flag.clone(),
            shared: self.shared.clone(),
        };

        match thread::Builder::new()
            .name("mediagraph-worker".to_string())
            .spawn(move || worker.run())
        {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.run_flag.store(false, Ordering::SeqCst);
                self.shared.set_state(PipelineState::Idle);
                self.services
                    .logger
                    .error(format!("Failed to spawn pipeline worker: {}", e));
                Err(MediaGraphError::Thread(e.to_string()))
            }
        }
    }

    /// Stop the current run and wait for the worker to exit
    ///
    /// Blocks until the graph has drained; there is no timeout. Observers are
    /// detached (keeping their last value) and released by the pipeline.
    /// No-op when nothing is running.
    pub fn stop(&mut self) {
        self.run_flag.store(false, Ordering::SeqCst);
        let Some(handle) = self.worker.take() else {
            return;
        };

        self.services.logger.info("Stopping pipeline");
        self.shared.set_state(PipelineState::ShuttingDown);
        if handle.join().is_err() {
            self.services.logger.error("Pipeline worker exited by panic");
        }

        self.observers.clear();
        self.shared.graph_alive.store(false, Ordering::SeqCst);
        self.shared.set_state(PipelineState::Idle);
        self.services.logger.info("Pipeline stopped");
    }

    /// Join a worker whose run ended on its own
    fn reap_finished_worker(&mut self) {
        if self.worker.as_ref().is_some_and(|h| h.is_finished()) {
            self.stop();
        }
    }

    fn warn_if_running(&self, what: &str) {
        if self.state() != PipelineState::Idle {
            self.services.logger.warn(format!(
                "Changing {} while the pipeline is {}; takes effect on next start",
                what,
                self.state()
            ));
        }
    }

    // ==================== Status ====================

    /// Current lifecycle state
    ///
    /// A run that ended on its own reads as `Idle` as soon as its thread has
    /// exited, even before the pipeline joins it.
    pub fn state(&self) -> PipelineState {
        match &self.worker {
            Some(handle) if handle.is_finished() => PipelineState::Idle,
            _ => self.shared.state(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    /// Whether a worker thread exists and has not exited yet
    pub fn is_worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Whether a graph instance currently exists
    pub fn is_graph_alive(&self) -> bool {
        self.shared.graph_alive.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Write a summary of the run counters through the logger
    pub fn log_stats(&self) {
        self.services
            .logger
            .info(format!("Pipeline stats: {}", self.stats()));
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
