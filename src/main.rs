//! MediaGraph - Command line runner
//!
//! Runs one pipeline for a fixed duration, then prints the last value seen
//! by every observer as JSON.

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use mediagraph_rs::{
    capture::{CaptureBackend, DefaultCaptureOpener, SyntheticPattern},
    config::{default_config_path, AppConfig},
    logging::init_tracing,
    Context, Landmark, Observer, Payload,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mediagraph")]
#[command(about = "Run a media graph pipeline on a camera or a video file")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// `;`-separated graph configuration resources
    #[arg(long)]
    graph: Option<String>,

    /// Directory relative graph resources are resolved against
    #[arg(long)]
    resource_root: Option<PathBuf>,

    /// Play a PPM stream file instead of a device
    #[arg(long)]
    file: Option<PathBuf>,

    /// Capture device index
    #[arg(long)]
    device: Option<i32>,

    /// Capture device API
    #[arg(long, value_enum, conflicts_with = "backend_api")]
    backend: Option<CaptureBackend>,

    /// Capture device API as a numeric identifier, e.g. 200 for V4L2
    #[arg(long)]
    backend_api: Option<i32>,

    /// Requested capture size as WIDTHxHEIGHT
    #[arg(long)]
    resolution: Option<String>,

    /// Requested capture frame rate
    #[arg(long)]
    fps: Option<i32>,

    /// Present the graph's rendered output
    #[arg(long)]
    overlay: bool,

    /// Output stream to observe (repeatable)
    #[arg(long = "observe")]
    observers: Vec<String>,

    /// Synthetic device pattern
    #[arg(long, value_enum, default_value_t = PatternArg::Gradient)]
    pattern: PatternArg,

    /// How long to run, in seconds
    #[arg(long, default_value_t = 5.0)]
    duration: f64,

    /// Directory for rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    save_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PatternArg {
    Gradient,
    Dot,
}

impl From<PatternArg> for SyntheticPattern {
    fn from(pattern: PatternArg) -> Self {
        match pattern {
            PatternArg::Gradient => SyntheticPattern::Gradient,
            PatternArg::Dot => SyntheticPattern::MovingDot,
        }
    }
}

#[derive(Serialize)]
struct ObserverSnapshot {
    stream: String,
    packets: u64,
    timestamp_us: Option<u64>,
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    landmarks: Option<Vec<Landmark>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl ObserverSnapshot {
    fn take(observer: &Observer) -> Self {
        let latest = observer.latest();
        let payload = latest.as_ref().map(|p| &p.payload);
        Self {
            stream: observer.channel_name().to_string(),
            packets: observer.sequence(),
            timestamp_us: latest.as_ref().map(|p| p.timestamp.as_micros()),
            kind: payload.map(Payload::kind),
            landmarks: payload.and_then(Payload::as_landmarks).map(<[_]>::to_vec),
            image: payload
                .and_then(Payload::as_image)
                .map(|f| (f.width(), f.height())),
            text: match payload {
                Some(Payload::Text(s)) => Some(s.clone()),
                _ => None,
            },
        }
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load_or_default(),
    };

    if let Some(root) = &args.resource_root {
        config.context.resource_root = root.clone();
    }
    if let Some(dir) = &args.log_dir {
        config.context.log_dir = Some(dir.clone());
    }

    let pipeline = &mut config.pipeline;
    if let Some(graph) = &args.graph {
        pipeline.graph = graph.clone();
    }
    if let Some(file) = &args.file {
        pipeline.capture.file = Some(file.clone());
    }
    let device = &mut pipeline.capture.device;
    if let Some(id) = args.device {
        device.id = id;
    }
    if let Some(backend) = args.backend {
        device.backend = backend;
    }
    if let Some(api) = args.backend_api {
        device.backend = CaptureBackend::from_api_id(api)
            .with_context(|| format!("unknown capture API id {}", api))?;
    }
    if let Some(resolution) = &args.resolution {
        let (width, height) = parse_resolution(resolution)?;
        device.width = width;
        device.height = height;
    }
    if let Some(fps) = args.fps {
        device.fps = fps;
    }
    if args.overlay {
        pipeline.overlay = true;
    }
    if !args.observers.is_empty() {
        pipeline.observers = args.observers.clone();
    }
    Ok(config)
}

fn parse_resolution(text: &str) -> Result<(i32, i32)> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .with_context(|| format!("resolution '{}' is not WIDTHxHEIGHT", text))?;
    Ok((w.trim().parse()?, h.trim().parse()?))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    if let Some(path) = &args.save_config {
        config.save(path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let _log_guard = init_tracing(&config.context.log_filter, config.context.log_dir.as_deref());
    tracing::info!("Starting MediaGraph");
    if args.config.is_none() {
        if let Some(path) = default_config_path() {
            tracing::debug!("Default config location: {:?}", path);
        }
    }

    let context = Context::builder()
        .resource_dir(config.context.resource_root.clone())
        .capture_opener(Arc::new(DefaultCaptureOpener {
            pattern: args.pattern.into(),
        }))
        .build();

    let mut pipeline = context.create_pipeline();
    let observers = pipeline.configure(&config.pipeline)?;
    pipeline.start()?;

    std::thread::sleep(Duration::from_secs_f64(args.duration.max(0.0)));

    tracing::info!("Shutting down...");
    pipeline.stop();
    pipeline.log_stats();

    let snapshots: Vec<_> = observers.iter().map(ObserverSnapshot::take).collect();
    println!("{}", serde_json::to_string_pretty(&snapshots)?);

    let stats = pipeline.stats();
    if stats.runs_failed > 0 {
        anyhow::bail!("pipeline run failed, see log for details");
    }
    Ok(())
}
