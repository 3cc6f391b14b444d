use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Stream of bytes for object content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Metadata for one entry in the virtual filesystem.
///
/// Directories are synthetic: they exist only because at least one object
/// or common prefix lives under `path + "/"`. A directory entry carries no
/// independent size and its modification time is best effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Virtual path, rooted at `/`
    pub path: String,
    /// Object size in bytes; always 0 for directories
    pub size: u64,
    /// Last modification time, when the backend reported one
    pub mod_time: Option<DateTime<Utc>>,
    /// Whether this entry is a synthetic directory
    pub is_dir: bool,
}

impl FileInfo {
    /// Entry for a concrete object
    pub fn file(path: String, size: u64, mod_time: Option<DateTime<Utc>>) -> Self {
        Self {
            path,
            size,
            mod_time,
            is_dir: false,
        }
    }

    /// Entry for a synthetic directory
    pub fn directory(path: String) -> Self {
        Self {
            path,
            size: 0,
            mod_time: None,
            is_dir: true,
        }
    }

    /// Final path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Options for [`crate::BlobFsDriver::walk`]
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Resume the walk strictly after this virtual path
    pub start_after: Option<String>,
}

impl WalkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the initial pagination marker so the walk resumes after `path`
    pub fn with_start_after<S: Into<String>>(mut self, path: S) -> Self {
        self.start_after = Some(path.into());
        self
    }
}
