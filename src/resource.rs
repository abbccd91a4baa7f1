//! Graph configuration resource loading
//!
//! A configuration is named by one or more resource identifiers separated by
//! [`RESOURCE_DELIMITER`]. Each identifier is resolved against the resource
//! root (unless absolute) and the contents are concatenated left to right.
//! The downstream parser treats the result as one document, so later
//! segments may extend what earlier segments declare.

use crate::error::{MediaGraphError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Separator between resource identifiers
pub const RESOURCE_DELIMITER: char = ';';

/// Shared, replaceable resource root
#[derive(Debug, Clone, Default)]
pub struct ResourceRoot {
    root: Arc<RwLock<PathBuf>>,
}

impl ResourceRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(RwLock::new(root.into())),
        }
    }

    /// Replace the root for every holder (last write wins)
    pub fn set(&self, root: impl Into<PathBuf>) {
        let root = root.into();
        match self.root.write() {
            Ok(mut guard) => *guard = root,
            Err(poisoned) => *poisoned.into_inner() = root,
        }
    }

    pub fn get(&self) -> PathBuf {
        match self.root.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Resolves and concatenates configuration resources
#[derive(Debug, Clone, Default)]
pub struct ResourceLoader {
    root: ResourceRoot,
}

impl ResourceLoader {
    pub fn new(root: ResourceRoot) -> Self {
        Self { root }
    }

    /// Resolve an identifier against the resource root
    pub fn resolve(&self, identifier: &str) -> PathBuf {
        let path = Path::new(identifier);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.get().join(path)
        }
    }

    /// Read a single resource
    pub fn load_file(&self, identifier: &str) -> Result<String> {
        let path = self.resolve(identifier);
        tracing::debug!("Loading resource {:?}", path);
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => MediaGraphError::ResourceNotFound { path },
            _ => MediaGraphError::Io(e).with_context(format!("reading {}", path.display())),
        })
    }

    /// Load every identifier in `list` and concatenate their contents
    ///
    /// Identifiers are trimmed of surrounding whitespace, so `"a.pbtxt; b.pbtxt"`
    /// names `a.pbtxt` and `b.pbtxt`; segments that are empty after trimming
    /// are skipped. Stops at the first failing identifier; nothing is
    /// returned for the segments that were read before it.
    pub fn load(&self, list: &str) -> Result<String> {
        let mut out = String::with_capacity(4096);
        for identifier in split_identifiers(list) {
            let contents = self.load_file(identifier)?;
            out.push_str(&contents);
        }
        Ok(out)
    }
}

/// Split a delimited identifier list into trimmed, non-empty identifiers
pub fn split_identifiers(list: &str) -> impl Iterator<Item = &str> {
    list.split(RESOURCE_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
