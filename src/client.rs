use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::{BatchFailure, BlobFsResult, ByteStream};

/// Capability boundary for the flat object store behind the driver.
///
/// The driver core is written against this trait only; the concrete SDK
/// client is an injected dependency. Every method issues at most one
/// backend request and translates failures into the portable taxonomy
/// before returning. No method retries.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Fetch an object's content, optionally starting at a byte offset
    async fn get(&self, key: &str, offset: u64) -> BlobFsResult<ByteStream>;

    /// Store a whole object in one request
    async fn put(&self, key: &str, body: Bytes) -> BlobFsResult<()>;

    /// Fetch object metadata without content
    async fn head(&self, key: &str) -> BlobFsResult<ObjectHead>;

    /// Fetch one page of a listing; chain pages by feeding
    /// [`ListPage::next_marker`] back as the next request's marker
    async fn list(&self, request: ListRequest) -> BlobFsResult<ListPage>;

    /// Server-side copy of one object
    async fn copy(&self, src_key: &str, dst_key: &str) -> BlobFsResult<()>;

    /// Delete one object; deleting a missing key succeeds
    async fn delete(&self, key: &str) -> BlobFsResult<()>;

    /// Delete up to [`ClientCapabilities::batch_delete_limit`] objects in
    /// one request, returning per-key failures instead of failing whole
    async fn delete_batch(&self, keys: Vec<String>) -> BlobFsResult<Vec<BatchFailure>>;

    /// Initiate an incremental upload session
    async fn create_upload(&self, key: &str) -> BlobFsResult<String>;

    /// Upload one numbered part, returning its ETag
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> BlobFsResult<String>;

    /// Finalize an incremental upload from its ordered part list
    async fn complete_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> BlobFsResult<()>;

    /// Abort an incremental upload session
    async fn abort_upload(&self, key: &str, upload_id: &str) -> BlobFsResult<()>;

    /// Generate a time-limited URL for direct reads.
    ///
    /// Only meaningful when [`ClientCapabilities::presigned_urls`] is set.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobFsResult<String>;

    /// What this backend supports
    fn capabilities(&self) -> ClientCapabilities;
}

/// Metadata returned by a head request
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// One backend listing request
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub prefix: String,
    /// Grouping delimiter; `None` lists every key under the prefix
    pub delimiter: Option<String>,
    /// Resume strictly after this cursor
    pub marker: Option<String>,
    pub max_keys: usize,
}

/// One page of a listing. Created per call and discarded after
/// consumption; pagination state lives entirely in the marker.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

/// One object entry within a listing page
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One part of a finished incremental upload, in ascending part order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Backend capabilities
#[derive(Debug, Clone)]
pub struct ClientCapabilities {
    /// Whether [`ObjectClient::presign_get`] works
    pub presigned_urls: bool,
    /// Per-request object limit for [`ObjectClient::delete_batch`]
    pub batch_delete_limit: usize,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            presigned_urls: false,
            batch_delete_limit: 1000,
        }
    }
}

impl ClientCapabilities {
    pub fn with_presigned_urls(mut self) -> Self {
        self.presigned_urls = true;
        self
    }

    pub fn with_batch_delete_limit(mut self, limit: usize) -> Self {
        self.batch_delete_limit = limit;
        self
    }
}
