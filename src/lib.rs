//! # dog-blobfs: a filesystem facade over flat object storage
//!
//! `dog-blobfs` presents a hierarchical, path-addressed filesystem
//! abstraction (get/put/stat/list/walk/move/delete of byte streams) on top
//! of a flat, key-value object store that has no native directories,
//! charges for round trips, bounds the size of incremental writes, and
//! paginates listings.
//!
//! ## Key Features
//!
//! - **Directory emulation**: hierarchy is derived per call from prefix
//!   and delimiter listings; directories are never materialized and never
//!   cached
//! - **Incremental uploads**: a buffered writer flushes fixed-size parts
//!   through the backend's multipart protocol, with a single-shot fallback
//!   for content smaller than one chunk
//! - **Portable errors**: backend error codes translate into one taxonomy,
//!   with unrecognized codes preserved for diagnostics
//! - **Storage agnostic**: the core is written against the
//!   [`ObjectClient`] trait; the bundled S3 client is an injected
//!   dependency, not a compile-time assumption
//!
//! ## Quick Start
//!
//! ```rust
//! use dog_blobfs::prelude::*;
//! use dog_blobfs::MemoryClient;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobFsResult<()> {
//! let config = DriverConfig::new("id", "secret", "us-east-1", "media")
//!     .with_root_directory("/registry");
//! let driver = BlobFsDriver::new(MemoryClient::new(), config)?;
//!
//! driver.put_content("/greetings/hello.txt", &b"Hello, world!"[..]).await?;
//! assert_eq!(driver.get_content("/greetings/hello.txt").await?, b"Hello, world!");
//!
//! // Directories exist because something lives under them.
//! let info = driver.stat("/greetings").await?;
//! assert!(info.is_dir);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  Your Service    │  ← paths, byte streams
//! ├──────────────────┤
//! │  BlobFsDriver    │  ← directory emulation, writer state machine
//! ├──────────────────┤
//! │  ObjectClient    │  ← flat keyspace primitives
//! └──────────────────┘
//! ```
//!
//! Large writes go through [`FileWriter`], an explicit state machine over
//! the backend's initiate/upload-part/complete protocol:
//!
//! ```rust
//! use dog_blobfs::prelude::*;
//! use dog_blobfs::MemoryClient;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobFsResult<()> {
//! # let config = DriverConfig::new("id", "secret", "us-east-1", "media");
//! # let driver = BlobFsDriver::new(MemoryClient::new(), config)?;
//! let mut writer = driver.writer("/videos/take-1.mp4", false).await?;
//! writer.write(b"frame data").await?;
//! writer.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Writers that hit an error must be cancelled: an abandoned incremental
//! upload session lives on at the backend and keeps billing.

pub mod client;
mod config;
mod driver;
mod error;
#[cfg(feature = "memory")]
mod memory;
mod path;
mod pool;
mod s3;
mod types;
mod writer;

// Re-export main types for clean API
pub use client::{
    ClientCapabilities, CompletedPart, ListPage, ListRequest, ObjectClient, ObjectHead,
    ObjectSummary,
};
pub use config::{
    DriverConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CONCURRENCY, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};
pub use driver::BlobFsDriver;
pub use error::{BatchFailure, BlobFsError, BlobFsResult};
#[cfg(feature = "memory")]
pub use memory::MemoryClient;
pub use path::KeyMapper;
pub use pool::BufferPool;
pub use s3::S3ObjectClient;
pub use types::{ByteStream, FileInfo, WalkOptions};
pub use writer::FileWriter;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobFsDriver, BlobFsError, BlobFsResult, ByteStream, DriverConfig, FileInfo, FileWriter,
        ObjectClient, WalkOptions,
    };
}
