//! Run counters
//!
//! Counters are updated by the worker thread and read from anywhere, so they
//! are plain atomics. [`PipelineStats::snapshot`] copies them into a
//! serializable [`StatsSnapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one pipeline, accumulated across runs
#[derive(Debug, Default)]
pub struct PipelineStats {
    runs_started: AtomicU64,
    runs_failed: AtomicU64,
    frames_captured: AtomicU64,
    empty_captures: AtomicU64,
    capture_errors: AtomicU64,
    frames_submitted: AtomicU64,
    frames_presented: AtomicU64,
    last_timestamp_us: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Number of runs the worker entered
    pub runs_started: u64,
    /// Runs that ended because of an error
    pub runs_failed: u64,
    /// Frames returned by the capture source
    pub frames_captured: u64,
    /// Reads that returned no frame
    pub empty_captures: u64,
    /// Reads that failed
    pub capture_errors: u64,
    /// Frames accepted by the graph
    pub frames_submitted: u64,
    /// Frames shown on the overlay surface
    pub frames_presented: u64,
    /// Timestamp of the last accepted frame
    pub last_timestamp_us: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            empty_captures: self.empty_captures.load(Ordering::Relaxed),
            capture_errors: self.capture_errors.load(Ordering::Relaxed),
            frames_submitted: self.frames_submitted.load(Ordering::Relaxed),
            frames_presented: self.frames_presented.load(Ordering::Relaxed),
            last_timestamp_us: self.last_timestamp_us.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn empty_capture(&self) {
        self.empty_captures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn capture_error(&self) {
        self.capture_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_submitted(&self, timestamp_us: u64) {
        self.frames_submitted.fetch_add(1, Ordering::Relaxed);
        self.last_timestamp_us.store(timestamp_us, Ordering::Relaxed);
    }

    pub(crate) fn frame_presented(&self) {
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "runs={} failed={} captured={} empty={} capture_errors={} submitted={} presented={} last_ts={}us",
            self.runs_started,
            self.runs_failed,
            self.frames_captured,
            self.empty_captures,
            self.capture_errors,
            self.frames_submitted,
            self.frames_presented,
            self.last_timestamp_us
        )
    }
}
