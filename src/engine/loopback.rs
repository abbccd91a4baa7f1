//! In-process reference graph engine
//!
//! [`LoopbackGraph`] implements [`GraphEngine`] without any inference: every
//! submitted frame is delivered straight back on the graph's output streams.
//! It is what the binary runs by default and what the test suite drives the
//! pipeline with.
//!
//! # Behaviour
//!
//! - `output_video` receives the submitted frame itself (graph layout, RGB)
//! - Every other observable stream receives a single [`Landmark`] placed on
//!   the brightest pixel of the frame
//! - Delivery happens synchronously inside `add_packet_to_input_stream`
//! - Timestamps must be strictly increasing, as in a real graph
//!
//! # Instrumentation
//!
//! All graphs created by one [`LoopbackFactory`] share a [`LoopbackProbe`]
//! that records submissions and counts live graph instances, so tests can
//! assert on what the pipeline did after the fact.
//!
//! # Example
//!
//! ```ignore
//! use mediagraph_rs::engine::{LoopbackFactory, LoopbackOptions};
//!
//! let factory = LoopbackFactory::with_options(LoopbackOptions {
//!     fail_on_submission: Some(3),
//!     ..Default::default()
//! });
//! let probe = factory.probe();
//! // ... run a pipeline with `factory` ...
//! assert_eq!(probe.submission_count(), 2);
//! ```

use super::{GraphConfig, GraphEngine, GraphFactory, OutputPoller, PacketCallback, OUTPUT_STREAM};
use crate::error::{MediaGraphError, Result};
use crate::types::{Frame, Landmark, Packet, Payload, Timestamp};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A frame received on an input stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub stream: String,
    pub timestamp: Timestamp,
    pub width: u32,
    pub height: u32,
}

/// Shared record of what loopback graphs have done
#[derive(Debug, Default)]
pub struct LoopbackProbe {
    submissions: Mutex<Vec<Submission>>,
    graphs_created: AtomicUsize,
    graphs_live: AtomicUsize,
    runs_completed: AtomicUsize,
    packets_delivered: AtomicU64,
}

impl LoopbackProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// All submissions across every graph, in arrival order
    pub fn submissions(&self) -> Vec<Submission> {
        match self.submissions.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn submission_count(&self) -> usize {
        match self.submissions.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Submission timestamps in arrival order
    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.submissions().into_iter().map(|s| s.timestamp).collect()
    }

    /// Number of graphs created so far
    pub fn graphs_created(&self) -> usize {
        self.graphs_created.load(Ordering::SeqCst)
    }

    /// Number of graphs not yet dropped
    pub fn live_graphs(&self) -> usize {
        self.graphs_live.load(Ordering::SeqCst)
    }

    /// Number of runs that reached `wait_until_done` successfully
    pub fn runs_completed(&self) -> usize {
        self.runs_completed.load(Ordering::SeqCst)
    }

    /// Total packets handed to observer callbacks and pollers
    pub fn packets_delivered(&self) -> u64 {
        self.packets_delivered.load(Ordering::SeqCst)
    }

    fn record(&self, submission: Submission) {
        match self.submissions.lock() {
            Ok(mut guard) => guard.push(submission),
            Err(poisoned) => poisoned.into_inner().push(submission),
        }
    }
}

/// Failure injection and pacing for loopback graphs
#[derive(Debug, Clone, Default)]
pub struct LoopbackOptions {
    /// Fail `initialize`
    pub fail_initialize: bool,
    /// Fail `start_run`
    pub fail_start: bool,
    /// Fail the Nth submission of a run (1-based)
    pub fail_on_submission: Option<usize>,
    /// Make every poller fail
    pub fail_poll: bool,
    /// Extra time spent per submission, to emulate a slow graph
    pub process_delay: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Created,
    Initialized,
    Running,
    Closed,
    Done,
}

struct LoopbackPoller {
    rx: Receiver<Packet>,
    fail: bool,
}

impl OutputPoller for LoopbackPoller {
    fn next(&mut self) -> Result<Packet> {
        if self.fail {
            return Err(MediaGraphError::Engine("poller failure injected".to_string()));
        }
        self.rx
            .recv()
            .map_err(|_| MediaGraphError::Engine("output stream closed".to_string()))
    }
}

/// Reference engine echoing frames back on its output streams
pub struct LoopbackGraph {
    options: LoopbackOptions,
    probe: Arc<LoopbackProbe>,
    config: Option<GraphConfig>,
    state: RunState,
    observers: Vec<(String, PacketCallback)>,
    pollers: Vec<(String, Sender<Packet>)>,
    last_timestamp: Option<Timestamp>,
    submitted: usize,
}

impl LoopbackGraph {
    pub fn new(options: LoopbackOptions, probe: Arc<LoopbackProbe>) -> Self {
        probe.graphs_created.fetch_add(1, Ordering::SeqCst);
        probe.graphs_live.fetch_add(1, Ordering::SeqCst);
        Self {
            options,
            probe,
            config: None,
            state: RunState::Created,
            observers: Vec::new(),
            pollers: Vec::new(),
            last_timestamp: None,
            submitted: 0,
        }
    }

    fn config(&self) -> Result<&GraphConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| MediaGraphError::Engine("graph not initialized".to_string()))
    }

    fn check_observable(&self, stream: &str) -> Result<()> {
        let config = self.config()?;
        if self.state != RunState::Initialized {
            return Err(MediaGraphError::Engine(format!(
                "cannot attach to '{}' after the run started",
                stream
            )));
        }
        if !config.has_output_stream(stream) {
            return Err(MediaGraphError::Engine(format!(
                "no output stream named '{}' (available: {})",
                stream,
                config.observable_streams().join(", ")
            )));
        }
        Ok(())
    }

    fn deliver(&mut self, frame: Frame, timestamp: Timestamp) {
        let image = Arc::new(frame);
        let mut landmarks: Option<Vec<Landmark>> = None;
        let mut delivered = 0u64;

        for (stream, callback) in self.observers.iter_mut() {
            let payload = if stream.as_str() == OUTPUT_STREAM {
                Payload::Image(image.clone())
            } else {
                Payload::Landmarks(
                    landmarks
                        .get_or_insert_with(|| vec![brightest_landmark(&image)])
                        .clone(),
                )
            };
            callback(&Packet::new(timestamp, payload));
            delivered += 1;
        }

        for (stream, tx) in &self.pollers {
            let payload = if stream.as_str() == OUTPUT_STREAM {
                Payload::Image(image.clone())
            } else {
                Payload::Landmarks(
                    landmarks
                        .get_or_insert_with(|| vec![brightest_landmark(&image)])
                        .clone(),
                )
            };
            if tx.send(Packet::new(timestamp, payload)).is_ok() {
                delivered += 1;
            }
        }

        self.probe
            .packets_delivered
            .fetch_add(delivered, Ordering::SeqCst);
    }
}

/// Landmark on the brightest pixel, coordinates normalized to [0, 1]
fn brightest_landmark(frame: &Frame) -> Landmark {
    let mut best = (0u32, 0u32, 0u32);
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            if let Some([a, b, c]) = frame.pixel(x, y) {
                let luma = a as u32 + b as u32 + c as u32;
                if luma > best.2 {
                    best = (x, y, luma);
                }
            }
        }
    }
    let norm = |v: u32, extent: u32| {
        if extent > 1 {
            v as f32 / (extent - 1) as f32
        } else {
            0.0
        }
    };
    Landmark {
        x: norm(best.0, frame.width()),
        y: norm(best.1, frame.height()),
        z: 0.0,
        visibility: best.2 as f32 / (3.0 * 255.0),
    }
}

impl GraphEngine for LoopbackGraph {
    fn initialize(&mut self, config: GraphConfig) -> Result<()> {
        if self.options.fail_initialize {
            return Err(MediaGraphError::Engine("initialize failure injected".to_string()));
        }
        if self.state != RunState::Created {
            return Err(MediaGraphError::Engine("graph already initialized".to_string()));
        }
        self.config = Some(config);
        self.state = RunState::Initialized;
        Ok(())
    }

    fn observe_output_stream(&mut self, stream: &str, callback: PacketCallback) -> Result<()> {
        self.check_observable(stream)?;
        self.observers.push((stream.to_string(), callback));
        Ok(())
    }

    fn add_output_stream_poller(&mut self, stream: &str) -> Result<Box<dyn OutputPoller>> {
        self.check_observable(stream)?;
        let (tx, rx) = unbounded();
        self.pollers.push((stream.to_string(), tx));
        Ok(Box::new(LoopbackPoller {
            rx,
            fail: self.options.fail_poll,
        }))
    }

    fn start_run(&mut self) -> Result<()> {
        if self.options.fail_start {
            return Err(MediaGraphError::Engine("start failure injected".to_string()));
        }
        if self.state != RunState::Initialized {
            return Err(MediaGraphError::Engine(format!(
                "cannot start run in state {:?}",
                self.state
            )));
        }
        self.state = RunState::Running;
        Ok(())
    }

    fn add_packet_to_input_stream(
        &mut self,
        stream: &str,
        frame: Frame,
        timestamp: Timestamp,
    ) -> Result<()> {
        if self.state != RunState::Running {
            return Err(MediaGraphError::Engine(format!(
                "graph not accepting input in state {:?}",
                self.state
            )));
        }
        let config = self.config()?;
        if !config.input_streams.is_empty() && !config.has_input_stream(stream) {
            return Err(MediaGraphError::Engine(format!(
                "no input stream named '{}'",
                stream
            )));
        }
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                return Err(MediaGraphError::Engine(format!(
                    "timestamp {} not greater than previous {}",
                    timestamp, last
                )));
            }
        }

        self.submitted += 1;
        if self.options.fail_on_submission == Some(self.submitted) {
            return Err(MediaGraphError::Engine(format!(
                "submission {} failure injected",
                self.submitted
            )));
        }

        self.last_timestamp = Some(timestamp);
        self.probe.record(Submission {
            stream: stream.to_string(),
            timestamp,
            width: frame.width(),
            height: frame.height(),
        });

        if let Some(delay) = self.options.process_delay {
            std::thread::sleep(delay);
        }

        self.deliver(frame, timestamp);
        Ok(())
    }

    fn close_input_stream(&mut self, stream: &str) -> Result<()> {
        match self.state {
            RunState::Running => {
                tracing::trace!("Loopback input '{}' closed", stream);
                self.state = RunState::Closed;
                Ok(())
            }
            RunState::Closed | RunState::Done => Ok(()),
            other => Err(MediaGraphError::Engine(format!(
                "cannot close input in state {:?}",
                other
            ))),
        }
    }

    fn wait_until_done(&mut self) -> Result<()> {
        match self.state {
            RunState::Closed => {
                self.state = RunState::Done;
                self.pollers.clear();
                self.observers.clear();
                self.probe.runs_completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            RunState::Done => Ok(()),
            RunState::Running => Err(MediaGraphError::Engine(
                "input streams still open".to_string(),
            )),
            RunState::Created | RunState::Initialized => Ok(()),
        }
    }
}

impl Drop for LoopbackGraph {
    fn drop(&mut self) {
        self.pollers.clear();
        self.observers.clear();
        self.probe.graphs_live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Factory for [`LoopbackGraph`] instances sharing one [`LoopbackProbe`]
#[derive(Debug, Clone, Default)]
pub struct LoopbackFactory {
    options: LoopbackOptions,
    probe: Arc<LoopbackProbe>,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LoopbackOptions) -> Self {
        Self {
            options,
            probe: Arc::new(LoopbackProbe::new()),
        }
    }

    /// The probe shared by every graph this factory creates
    pub fn probe(&self) -> Arc<LoopbackProbe> {
        self.probe.clone()
    }
}

impl GraphFactory for LoopbackFactory {
    fn create(&self) -> Box<dyn GraphEngine> {
        Box::new(LoopbackGraph::new(self.options.clone(), self.probe.clone()))
    }
}
