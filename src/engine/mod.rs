//! Graph engine boundary
//!
//! The dataflow graph that runs inference is an external collaborator. This
//! module defines the interface the pipeline drives it through, so real
//! engines and test doubles can be used interchangeably.
//!
//! # Components
//!
//! - [`GraphEngine`] - One graph instance, owned by a pipeline worker for one run
//! - [`OutputPoller`] - Blocking reader for one output stream
//! - [`GraphFactory`] - Parses configuration text and creates engine instances
//! - [`GraphConfig`] - Structured form of the configuration text
//! - [`loopback::LoopbackGraph`] - In-process reference engine
//!
//! # Call order
//!
//! A worker calls `initialize`, then `observe_output_stream` /
//! `add_output_stream_poller` for every consumer, then `start_run`, then any
//! number of `add_packet_to_input_stream`, then `close_input_stream` and
//! `wait_until_done`. Each call returns only when its work is done; an engine
//! may use threads internally, but delivery callbacks must not run after
//! `wait_until_done` returns or after the engine is dropped.

pub mod graph_config;
pub mod loopback;

pub use graph_config::{GraphConfig, GraphNode};
pub use loopback::{LoopbackFactory, LoopbackGraph, LoopbackOptions, LoopbackProbe, Submission};

use crate::error::Result;
use crate::types::{Frame, Packet, Timestamp};

/// Name of the graph input stream fed with captured frames
pub const INPUT_STREAM: &str = "input_video";

/// Name of the graph output stream carrying the rendered overlay
pub const OUTPUT_STREAM: &str = "output_video";

/// Callback invoked by the engine for every packet on an observed stream
pub type PacketCallback = Box<dyn FnMut(&Packet) + Send>;

/// Blocking reader for one graph output stream
pub trait OutputPoller: Send {
    /// Wait for the next packet
    ///
    /// Fails once the stream is closed and drained or the graph errored.
    fn next(&mut self) -> Result<Packet>;
}

/// A single dataflow graph instance
///
/// Implementations must be `Send`: the instance is created on the worker
/// thread's behalf and used only from it.
pub trait GraphEngine: Send {
    /// Validate the configuration and build the graph
    fn initialize(&mut self, config: GraphConfig) -> Result<()>;

    /// Register a delivery callback for every packet on `stream`
    fn observe_output_stream(&mut self, stream: &str, callback: PacketCallback) -> Result<()>;

    /// Create a blocking poller for `stream`
    fn add_output_stream_poller(&mut self, stream: &str) -> Result<Box<dyn OutputPoller>>;

    /// Start executing the graph
    fn start_run(&mut self) -> Result<()>;

    /// Submit a frame at `timestamp`
    ///
    /// Timestamps on a stream must be strictly increasing.
    fn add_packet_to_input_stream(
        &mut self,
        stream: &str,
        frame: Frame,
        timestamp: Timestamp,
    ) -> Result<()>;

    /// Signal end-of-stream on `stream`
    fn close_input_stream(&mut self, stream: &str) -> Result<()>;

    /// Block until all in-flight packets are processed and the run is complete
    fn wait_until_done(&mut self) -> Result<()>;
}

/// Creates graph instances for pipeline runs
pub trait GraphFactory: Send + Sync {
    /// Parse configuration text into the engine's structured form
    fn parse_config(&self, text: &str) -> Result<GraphConfig> {
        GraphConfig::parse(text)
    }

    /// Create a new, uninitialized graph
    fn create(&self) -> Box<dyn GraphEngine>;
}
