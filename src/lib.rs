//! # MediaGraph-RS: Real-time Media Pipeline Controller
//!
//! Drives a dataflow graph (e.g. a landmark-detection graph) from a live
//! camera or a video file on a dedicated worker thread, and exposes the
//! graph's output streams to other threads through latest-value observers.
//!
//! ## Architecture
//!
//! - **Context**: Process-level root; holds the log sink, the resource root
//!   and the graph/capture/render factories, and creates pipelines
//! - **Pipeline**: Idle/Running/ShuttingDown state machine owning one worker
//!   thread per run
//! - **Worker**: Capture → convert → submit → (overlay) poll and present loop
//! - **Observer**: Thread-safe single-slot mailbox for one output stream
//! - **Boundaries**: [`engine::GraphEngine`], [`capture::CaptureSource`] and
//!   [`render::RenderSurface`] traits, with in-process reference
//!   implementations
//!
//! ## Configuration
//!
//! Graph configuration text is loaded from one or more `;`-separated
//! resources relative to the context's resource root and concatenated in
//! order. Context and pipeline settings can be stored in a TOML file, see
//! [`config`].
//!
//! ## Example
//!
//! ```ignore
//! use mediagraph_rs::Context;
//!
//! fn main() -> mediagraph_rs::Result<()> {
//!     let context = Context::new();
//!     context.set_resource_dir("/opt/graphs");
//!
//!     let mut pipeline = context.create_pipeline();
//!     pipeline.set_graph_configuration("pose_tracking.pbtxt");
//!     pipeline.set_capture_params(0, Default::default(), 1280, 720, 30);
//!     let pose = pipeline.register_observer("pose_landmarks")?;
//!
//!     pipeline.start()?;
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     if let Some(packet) = pose.latest() {
//!         println!("{:?}", packet.payload.as_landmarks());
//!     }
//!     pipeline.stop();
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod context;
pub mod convert;
pub mod engine;
pub mod error;
pub mod logging;
pub mod observer;
pub mod pipeline;
pub mod render;
pub mod resource;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, ContextConfig, PipelineConfig};
pub use context::{Context, ContextBuilder};
pub use error::{MediaGraphError, Result};
pub use observer::Observer;
pub use pipeline::{Pipeline, PipelineState, StatsSnapshot};
pub use types::{Frame, Landmark, Packet, Payload, PixelFormat, Timestamp};
