//! Error handling for mediagraph-rs
//!
//! This module defines the error taxonomy shared by the pipeline, its
//! collaborators and the binary, plus a Result alias.
//!
//! # Taxonomy
//!
//! - **Configuration**: [`MediaGraphError::ResourceNotFound`], [`MediaGraphError::Io`],
//!   [`MediaGraphError::ConfigParse`], [`MediaGraphError::Config`]
//! - **Device**: [`MediaGraphError::Device`]
//! - **Engine**: [`MediaGraphError::Engine`]
//! - **State**: [`MediaGraphError::InvalidState`]
//!
//! Errors of the first three kinds are terminal for a single pipeline run and
//! are only ever logged by the worker thread. State errors are returned to the
//! caller synchronously.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mediagraph-rs operations
#[derive(Error, Debug)]
pub enum MediaGraphError {
    /// A configuration resource could not be located
    #[error("Resource not found: {}", path.display())]
    ResourceNotFound { path: PathBuf },

    /// Graph configuration text is malformed
    #[error("Config parse error at line {line}: {message}")]
    ConfigParse { line: usize, message: String },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Capture source failed to open or to apply settings
    #[error("Device error: {0}")]
    Device(String),

    /// Failure reported by the graph engine
    #[error("Engine error: {0}")]
    Engine(String),

    /// Operation not permitted in the pipeline's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Worker thread could not be created
    #[error("Thread error: {0}")]
    Thread(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MediaGraphError>,
    },
}

impl MediaGraphError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MediaGraphError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &MediaGraphError {
        match self {
            MediaGraphError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error is a state error (the only kind returned synchronously)
    pub fn is_invalid_state(&self) -> bool {
        matches!(self.root(), MediaGraphError::InvalidState(_))
    }
}

impl From<toml::de::Error> for MediaGraphError {
    fn from(err: toml::de::Error) -> Self {
        MediaGraphError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for MediaGraphError {
    fn from(err: toml::ser::Error) -> Self {
        MediaGraphError::Serialization(err.to_string())
    }
}

/// Result type alias for mediagraph-rs operations
pub type Result<T> = std::result::Result<T, MediaGraphError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
