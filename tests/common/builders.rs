//! Test data builders

use mediagraph_rs::capture::CaptureOpener;
use mediagraph_rs::engine::{LoopbackFactory, LoopbackOptions, LoopbackProbe};
use mediagraph_rs::logging::{ChannelSink, Severity};
use mediagraph_rs::render::SurfaceFactory;
use mediagraph_rs::Context;
use crossbeam_channel::Receiver;
use std::path::Path;
use std::sync::Arc;

/// Builder for graph configuration text
pub struct GraphTextBuilder {
    inputs: Vec<String>,
    outputs: Vec<String>,
    nodes: Vec<(String, String, String)>,
}

impl GraphTextBuilder {
    /// A graph reading `input_video`
    pub fn new() -> Self {
        Self {
            inputs: vec!["input_video".to_string()],
            outputs: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn output(mut self, stream: &str) -> Self {
        self.outputs.push(stream.to_string());
        self
    }

    pub fn node(mut self, calculator: &str, input: &str, output: &str) -> Self {
        self.nodes
            .push((calculator.to_string(), input.to_string(), output.to_string()));
        self
    }

    pub fn build(self) -> String {
        let mut text = String::from("# generated for tests\n");
        for input in &self.inputs {
            text.push_str(&format!("input_stream: \"{}\"\n", input));
        }
        for output in &self.outputs {
            text.push_str(&format!("output_stream: \"{}\"\n", output));
        }
        for (calculator, input, output) in &self.nodes {
            text.push_str(&format!(
                "node {{\n  calculator: \"{}\"\n  input_stream: \"IMAGE:{}\"\n  output_stream: \"{}\"\n}}\n",
                calculator, input, output
            ));
        }
        text
    }
}

impl Default for GraphTextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A context wired to a loopback engine, with its probe and captured log
pub struct TestRig {
    pub context: Context,
    pub probe: Arc<LoopbackProbe>,
    pub logs: Receiver<(Severity, String)>,
}

impl TestRig {
    pub fn errors(&self) -> Vec<String> {
        self.logs
            .try_iter()
            .filter(|(severity, _)| *severity == Severity::Error)
            .map(|(_, message)| message)
            .collect()
    }
}

/// Builder for [`TestRig`]
pub struct TestRigBuilder {
    options: LoopbackOptions,
    resource_dir: Option<std::path::PathBuf>,
    opener: Option<Arc<dyn CaptureOpener>>,
    surfaces: Option<Arc<dyn SurfaceFactory>>,
}

impl TestRigBuilder {
    pub fn new() -> Self {
        Self {
            options: LoopbackOptions::default(),
            resource_dir: None,
            opener: None,
            surfaces: None,
        }
    }

    pub fn options(mut self, options: LoopbackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resource_dir(mut self, dir: &Path) -> Self {
        self.resource_dir = Some(dir.to_path_buf());
        self
    }

    pub fn opener(mut self, opener: Arc<dyn CaptureOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn surfaces(mut self, surfaces: Arc<dyn SurfaceFactory>) -> Self {
        self.surfaces = Some(surfaces);
        self
    }

    pub fn build(self) -> TestRig {
        let factory = LoopbackFactory::with_options(self.options);
        let probe = factory.probe();
        let (sink, logs) = ChannelSink::new(4096);

        let mut builder = Context::builder()
            .graph_factory(Arc::new(factory))
            .log_sink(Arc::new(sink));
        if let Some(dir) = self.resource_dir {
            builder = builder.resource_dir(dir);
        }
        if let Some(opener) = self.opener {
            builder = builder.capture_opener(opener);
        }
        if let Some(surfaces) = self.surfaces {
            builder = builder.surface_factory(surfaces);
        }

        TestRig {
            context: builder.build(),
            probe,
            logs,
        }
    }
}

impl Default for TestRigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediagraph_rs::engine::GraphConfig;

    #[test]
    fn test_graph_text_builder() {
        let text = GraphTextBuilder::new()
            .output("X")
            .node("LandmarkCalculator", "input_video", "Y")
            .build();
        let config = GraphConfig::parse(&text).unwrap();

        assert_eq!(config.input_streams, vec!["input_video"]);
        assert!(config.has_output_stream("X"));
        assert!(config.has_output_stream("Y"));
        assert_eq!(config.nodes[0].input_streams, vec!["input_video"]);
    }
}
