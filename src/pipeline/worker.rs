//! Pipeline worker thread
//!
//! One [`Worker`] is spawned per run. It owns the graph, the capture source
//! and the render surface for the whole run and is the only thread that
//! touches them.
//!
//! # Run routine
//!
//! 1. Load and parse the graph configuration
//! 2. Create and initialize the graph, attach observers
//! 3. With the overlay enabled, add the output poller and open the surface
//! 4. Open the capture source and apply requested device settings
//! 5. Start the graph run
//! 6. Capture, convert, submit and (optionally) present until stopped
//! 7. Close the input stream and wait for the graph to drain, also after a
//!    failed submission or poll
//!
//! Shutdown runs afterwards no matter how the routine ended, including on
//! panic. Errors stop at this thread: they are logged and counted, never
//! returned to the owner.

use super::clock::MonotonicClock;
use super::{PipelineSettings, PipelineShared, PipelineState, Services};
use crate::capture::CaptureSource;
use crate::convert;
use crate::engine::{GraphEngine, OutputPoller, INPUT_STREAM, OUTPUT_STREAM};
use crate::error::{MediaGraphError, Result, ResultExt};
use crate::observer::Observer;
use crate::render::{RenderSurface, WINDOW_TITLE};
use crate::types::PixelFormat;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything a run owns, released in [`Worker::shutdown`]
#[derive(Default)]
struct RunResources {
    graph: Option<Box<dyn GraphEngine>>,
    poller: Option<Box<dyn OutputPoller>>,
    surface: Option<Box<dyn RenderSurface>>,
    capture: Option<Box<dyn CaptureSource>>,
}

/// Clears the graph indicator when the worker exits, however it exits
///
/// The pipeline reports `Idle` once the thread has finished, so the worker
/// never writes that state itself.
struct GraphReleasedOnExit<'a>(&'a PipelineShared);

impl Drop for GraphReleasedOnExit<'_> {
    fn drop(&mut self) {
        self.0.graph_alive.store(false, Ordering::SeqCst);
    }
}

/// State handed to the worker thread for one run
pub(crate) struct Worker {
    pub(crate) settings: PipelineSettings,
    pub(crate) observers: Vec<Observer>,
    pub(crate) services: Services,
    pub(crate) run_flag: Arc<AtomicBool>,
    pub(crate) shared: Arc<PipelineShared>,
}

impl Worker {
    /// Thread entry point
    pub(crate) fn run(self) {
        let _released = GraphReleasedOnExit(&self.shared);
        let logger = self.services.logger.clone();
        logger.info("Enter worker");
        self.shared.stats.run_started();

        let mut resources = RunResources::default();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_graph(&mut resources)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.shared.stats.run_failed();
                logger.error(format!("Pipeline run failed: {}", e));
            }
            Err(payload) => {
                self.shared.stats.run_failed();
                logger.error(format!("Pipeline worker panicked: {}", panic_message(&*payload)));
            }
        }

        self.shutdown(resources);
        logger.info("Leave worker");
    }

    fn run_graph(&self, r: &mut RunResources) -> Result<()> {
        let logger = &self.services.logger;

        logger.info(format!("Loading graph configuration '{}'", self.settings.graph));
        let text = self
            .services
            .resources
            .load(&self.settings.graph)
            .context("loading graph configuration")?;
        let config = self.services.graph_factory.parse_config(&text)?;

        logger.info("Initializing graph");
        let graph = r.graph.insert(self.services.graph_factory.create());
        self.shared.graph_alive.store(true, Ordering::SeqCst);
        graph.initialize(config)?;

        for observer in &self.observers {
            logger.debug(format!("Observing '{}'", observer.channel_name()));
            observer.attach(&mut **graph)?;
        }

        if self.settings.overlay {
            r.poller = Some(
                graph
                    .add_output_stream_poller(OUTPUT_STREAM)
                    .context("adding overlay poller")?,
            );
            r.surface = Some(self.services.surfaces.create(WINDOW_TITLE)?);
        }

        let capture = r.capture.insert(self.open_capture()?);
        logger.info(format!("Capture opened: {}", capture.describe()));

        graph.start_run()?;
        logger.info("Graph running");

        let overlay = match (r.poller.as_mut(), r.surface.as_mut()) {
            (Some(poller), Some(surface)) => Some((poller, surface)),
            _ => None,
        };
        let pumped = self.pump(&mut **graph, &mut **capture, overlay);

        // the graph is closed and drained even when the loop failed
        logger.info("Closing input stream");
        let drained = graph
            .close_input_stream(INPUT_STREAM)
            .and_then(|()| graph.wait_until_done())
            .context("draining graph");
        if let (Err(_), Err(e)) = (&pumped, &drained) {
            logger.warn(format!("Graph did not drain after failure: {}", e));
        }
        pumped.and(drained)
    }

    /// Capture, convert, submit and present until the run flag clears
    fn pump(
        &self,
        graph: &mut dyn GraphEngine,
        capture: &mut dyn CaptureSource,
        mut overlay: Option<(&mut Box<dyn OutputPoller>, &mut Box<dyn RenderSurface>)>,
    ) -> Result<()> {
        let logger = &self.services.logger;
        let stats = &self.shared.stats;
        let mirror = self.settings.capture.uses_device();
        let mut clock = MonotonicClock::new();

        while self.run_flag.load(Ordering::SeqCst) {
            let frame = match capture.read_frame() {
                Ok(Some(frame)) if !frame.is_empty() => frame,
                Ok(_) => {
                    stats.empty_capture();
                    std::thread::yield_now();
                    continue;
                }
                Err(e) => {
                    stats.capture_error();
                    logger.debug(format!("Capture read failed: {}", e));
                    std::thread::yield_now();
                    continue;
                }
            };
            stats.frame_captured();

            let timestamp = clock.next();
            let frame = convert::prepare_for_graph(frame, PixelFormat::Rgb8, mirror);
            graph
                .add_packet_to_input_stream(INPUT_STREAM, frame, timestamp)
                .with_context(|| format!("submitting frame at {}", timestamp))?;
            stats.frame_submitted(timestamp.as_micros());

            if let Some((poller, surface)) = overlay.as_mut() {
                let packet = poller.next().context("polling overlay output")?;
                let image = packet.payload.as_image().ok_or_else(|| {
                    MediaGraphError::Engine(format!(
                        "'{}' delivered {} instead of an image",
                        OUTPUT_STREAM,
                        packet.payload.kind()
                    ))
                })?;
                let mut display = (**image).clone();
                convert::convert_in_place(&mut display, PixelFormat::Bgr8);
                surface.present(&display)?;
                stats.frame_presented();
            }
        }
        Ok(())
    }

    fn open_capture(&self) -> Result<Box<dyn CaptureSource>> {
        let opener = &self.services.capture_opener;
        let capture = &self.settings.capture;

        if let Some(path) = &capture.file {
            return opener
                .open_file(path)
                .with_context(|| format!("opening {}", path.display()));
        }

        let device = &capture.device;
        let backend = device.backend.resolve_for_platform();
        let mut source = opener
            .open_device(device.id, backend)
            .with_context(|| {
                format!(
                    "opening device {} via {} (api {})",
                    device.id,
                    backend,
                    backend.api_id()
                )
            })?;

        // settings the device refuses are not fatal
        if let Some((width, height)) = device.requested_resolution() {
            if let Err(e) = source.set_resolution(width, height) {
                self.services
                    .logger
                    .warn(format!("Could not set resolution {}x{}: {}", width, height, e));
            }
        }
        if let Some(fps) = device.requested_fps() {
            if let Err(e) = source.set_fps(fps) {
                self.services
                    .logger
                    .warn(format!("Could not set frame rate {}: {}", fps, e));
            }
        }
        Ok(source)
    }

    fn shutdown(&self, mut r: RunResources) {
        let logger = &self.services.logger;
        logger.info("Shutting down run");
        self.shared.set_state(PipelineState::ShuttingDown);

        for observer in &self.observers {
            observer.detach();
        }
        r.poller = None;
        r.graph = None;
        self.shared.graph_alive.store(false, Ordering::SeqCst);

        if let Some(mut surface) = r.surface.take() {
            surface.close();
        }
        r.capture = None;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
