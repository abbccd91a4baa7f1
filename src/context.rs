//! Process-level context
//!
//! A [`Context`] carries what every pipeline in a process shares: the log
//! sink, the resource root, and the factories for graphs, capture sources
//! and render surfaces. Pipelines are created from it and keep live handles
//! to the sink and the root, so changing either affects running pipelines
//! too (last write wins).
//!
//! # Example
//!
//! ```ignore
//! use mediagraph_rs::{Context, logging::NullSink};
//! use std::sync::Arc;
//!
//! let context = Context::builder()
//!     .resource_dir("/opt/graphs")
//!     .log_sink(Arc::new(NullSink))
//!     .build();
//! let pipeline = context.create_pipeline();
//! ```

use crate::capture::{CaptureOpener, DefaultCaptureOpener};
use crate::config::ContextConfig;
use crate::engine::{GraphFactory, LoopbackFactory};
use crate::logging::{LogSink, Logger};
use crate::pipeline::{Pipeline, Services};
use crate::render::{NullSurface, SurfaceFactory};
use crate::resource::{ResourceLoader, ResourceRoot};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared configuration root and pipeline factory
#[derive(Clone)]
pub struct Context {
    resource_root: ResourceRoot,
    logger: Logger,
    graph_factory: Arc<dyn GraphFactory>,
    capture_opener: Arc<dyn CaptureOpener>,
    surfaces: Arc<dyn SurfaceFactory>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("resource_root", &self.resource_root.get())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Context with the reference engine, synthetic devices and no overlay window
    pub fn new() -> Self {
        ContextBuilder::default().build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Context with the resource root from `config` and default factories
    pub fn from_config(config: &ContextConfig) -> Self {
        Self::builder()
            .resource_dir(config.resource_root.clone())
            .build()
    }

    /// Replace the log sink for this context and all its pipelines
    pub fn set_log_sink(&self, sink: Arc<dyn LogSink>) {
        self.logger.set_sink(sink);
    }

    /// Replace the resource root for this context and all its pipelines
    pub fn set_resource_dir(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.logger
            .debug(format!("Resource root set to {}", dir.display()));
        self.resource_root.set(dir);
    }

    pub fn resource_dir(&self) -> PathBuf {
        self.resource_root.get()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Create an idle pipeline bound to this context
    pub fn create_pipeline(&self) -> Pipeline {
        Pipeline::new(Services {
            graph_factory: self.graph_factory.clone(),
            capture_opener: self.capture_opener.clone(),
            surfaces: self.surfaces.clone(),
            resources: ResourceLoader::new(self.resource_root.clone()),
            logger: self.logger.clone(),
        })
    }
}

/// Builder for [`Context`]
#[derive(Default)]
pub struct ContextBuilder {
    resource_dir: Option<PathBuf>,
    log_sink: Option<Arc<dyn LogSink>>,
    graph_factory: Option<Arc<dyn GraphFactory>>,
    capture_opener: Option<Arc<dyn CaptureOpener>>,
    surfaces: Option<Arc<dyn SurfaceFactory>>,
}

impl ContextBuilder {
    pub fn resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn graph_factory(mut self, factory: Arc<dyn GraphFactory>) -> Self {
        self.graph_factory = Some(factory);
        self
    }

    pub fn capture_opener(mut self, opener: Arc<dyn CaptureOpener>) -> Self {
        self.capture_opener = Some(opener);
        self
    }

    pub fn surface_factory(mut self, surfaces: Arc<dyn SurfaceFactory>) -> Self {
        self.surfaces = Some(surfaces);
        self
    }

    pub fn build(self) -> Context {
        let logger = match self.log_sink {
            Some(sink) => Logger::new(sink),
            None => Logger::default(),
        };
        Context {
            resource_root: ResourceRoot::new(self.resource_dir.unwrap_or_default()),
            logger,
            graph_factory: self
                .graph_factory
                .unwrap_or_else(|| Arc::new(LoopbackFactory::new())),
            capture_opener: self
                .capture_opener
                .unwrap_or_else(|| Arc::new(DefaultCaptureOpener::default())),
            surfaces: self.surfaces.unwrap_or_else(|| Arc::new(NullSurface)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{ChannelSink, Severity};

    #[test]
    fn test_resource_dir_last_write_wins() {
        let context = Context::new();
        context.set_resource_dir("/a");
        context.set_resource_dir("/b");
        assert_eq!(context.resource_dir(), PathBuf::from("/b"));

        let clone = context.clone();
        clone.set_resource_dir("/c");
        assert_eq!(context.resource_dir(), PathBuf::from("/c"));
    }

    #[test]
    fn test_log_sink_reaches_pipelines() {
        let context = Context::new();
        let mut pipeline = context.create_pipeline();

        let (sink, rx) = ChannelSink::new(16);
        context.set_log_sink(Arc::new(sink));
        pipeline.stop();
        pipeline.start().unwrap();
        pipeline.stop();

        let messages: Vec<_> = rx.try_iter().collect();
        assert!(messages
            .iter()
            .any(|(severity, m)| *severity == Severity::Info && m.contains("Starting pipeline")));
    }

    #[test]
    fn test_from_config_uses_resource_root() {
        let config = ContextConfig {
            resource_root: PathBuf::from("/opt/graphs"),
            ..Default::default()
        };
        let context = Context::from_config(&config);
        assert_eq!(context.resource_dir(), PathBuf::from("/opt/graphs"));
    }

    #[test]
    fn test_pipelines_share_resource_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("g.pbtxt"),
            "input_stream: \"input_video\"\noutput_stream: \"out\"\n",
        )
        .unwrap();

        let factory = Arc::new(LoopbackFactory::new());
        let probe = factory.probe();
        let context = Context::builder()
            .graph_factory(factory)
            .log_sink(Arc::new(crate::logging::NullSink))
            .build();
        let mut pipeline = context.create_pipeline();
        pipeline.set_graph_configuration("g.pbtxt");

        // set after the pipeline exists
        context.set_resource_dir(dir.path());
        pipeline.start().unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while probe.submission_count() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        pipeline.stop();
        assert!(probe.submission_count() > 0);
    }
}
