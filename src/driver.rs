use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    BlobFsError, BlobFsResult, BufferPool, ByteStream, DriverConfig, FileInfo, FileWriter,
    KeyMapper, ListRequest, ObjectClient, WalkOptions,
};

/// Page size for backend listings
const LIST_MAX_KEYS: usize = 1000;

/// Hierarchical, path-addressed filesystem facade over a flat object
/// store.
///
/// Directories are never materialized: every hierarchy fact is derived
/// per call from prefix and delimiter listings, and nothing is cached
/// between calls. The backend is an injected [`ObjectClient`]; any
/// compliant implementation can be substituted.
pub struct BlobFsDriver {
    client: Arc<dyn ObjectClient>,
    keys: KeyMapper,
    config: DriverConfig,
    pool: Arc<BufferPool>,
}

impl BlobFsDriver {
    /// Create a driver over an injected backend client.
    ///
    /// The configuration is validated here, before any network call, and
    /// is immutable for the driver's lifetime.
    pub fn new<C: ObjectClient + 'static>(client: C, config: DriverConfig) -> BlobFsResult<Self> {
        Self::with_client(Arc::new(client), config)
    }

    /// Create a driver over a shared backend client
    pub fn with_client(client: Arc<dyn ObjectClient>, config: DriverConfig) -> BlobFsResult<Self> {
        config.validate()?;
        let keys = KeyMapper::new(&config.root_directory);
        let pool = Arc::new(BufferPool::new(config.chunk_size));
        Ok(Self {
            client,
            keys,
            config,
            pool,
        })
    }

    /// Connect to an S3-compatible backend described by the configuration
    pub async fn connect(config: DriverConfig) -> BlobFsResult<Self> {
        config.validate()?;
        let client = crate::S3ObjectClient::connect(&config).await?;
        Self::with_client(Arc::new(client), config)
    }

    /// This driver's configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Retrieve the full content stored at `path`
    pub async fn get_content(&self, path: &str) -> BlobFsResult<Vec<u8>> {
        let mut stream = self.reader(path, 0).await?;
        let mut content = Vec::new();
        while let Some(chunk) = stream.next().await {
            content.extend_from_slice(&chunk?);
        }
        Ok(content)
    }

    /// Store `content` at `path` as one whole object
    pub async fn put_content(&self, path: &str, content: impl Into<Bytes>) -> BlobFsResult<()> {
        let key = self.keys.to_key(path);
        self.client
            .put(&key, content.into())
            .await
            .map_err(|e| e.with_path(KeyMapper::normalize(path)))
    }

    /// Open a content stream starting at `offset`
    pub async fn reader(&self, path: &str, offset: u64) -> BlobFsResult<ByteStream> {
        let key = self.keys.to_key(path);
        self.client
            .get(&key, offset)
            .await
            .map_err(|e| e.with_path(KeyMapper::normalize(path)))
    }

    /// Open a writer that stores its content at `path` on commit.
    ///
    /// Append mode fails with [`BlobFsError::Unsupported`] whenever any
    /// object already exists at the path; the backend has no append
    /// primitive and rewriting the object behind the caller's back would
    /// neither be cheap nor race safe.
    pub async fn writer(&self, path: &str, append: bool) -> BlobFsResult<FileWriter> {
        let key = self.keys.to_key(path);

        if append {
            match self.client.head(&key).await {
                Ok(_) => {
                    return Err(BlobFsError::unsupported(format!(
                        "append to existing object at {}",
                        KeyMapper::normalize(path)
                    )));
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.with_path(KeyMapper::normalize(path))),
            }
        }

        Ok(FileWriter::new(
            self.client.clone(),
            self.pool.clone(),
            key,
            self.config.chunk_size,
        ))
    }

    /// Describe the entry at `path`.
    ///
    /// An exact object wins; otherwise one delimited listing under
    /// `path/` decides whether a synthetic directory exists. A key that
    /// is both an object and a prefix reports as the object, a backend
    /// quirk the emulator surfaces as is.
    pub async fn stat(&self, path: &str) -> BlobFsResult<FileInfo> {
        let normalized = KeyMapper::normalize(path);
        let key = self.keys.to_key(path);

        match self.client.head(&key).await {
            Ok(head) => {
                return Ok(FileInfo::file(normalized, head.size, head.last_modified));
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.with_path(normalized)),
        }

        let page = self
            .client
            .list(ListRequest {
                prefix: self.keys.to_prefix(path),
                delimiter: Some("/".to_string()),
                marker: None,
                max_keys: 1,
            })
            .await
            .map_err(|e| e.with_path(normalized.clone()))?;

        if page.objects.is_empty() && page.common_prefixes.is_empty() {
            return Err(BlobFsError::not_found(normalized));
        }
        Ok(FileInfo::directory(normalized))
    }

    /// List the direct children of the directory at `path`.
    ///
    /// Objects become file entries and common prefixes become synthetic
    /// directory entries, both reported as full virtual paths. An empty
    /// prefix yields an empty listing, not an error.
    pub async fn list(&self, path: &str) -> BlobFsResult<Vec<FileInfo>> {
        let normalized = KeyMapper::normalize(path);
        let prefix = self.keys.to_prefix(path);
        let mut entries = Vec::new();
        let mut marker = None;

        loop {
            let page = self
                .client
                .list(ListRequest {
                    prefix: prefix.clone(),
                    delimiter: Some("/".to_string()),
                    marker,
                    max_keys: LIST_MAX_KEYS,
                })
                .await
                .map_err(|e| e.with_path(normalized.clone()))?;

            for object in page.objects {
                // The directory marker for the listed prefix is not a child.
                if object.key == prefix {
                    continue;
                }
                entries.push(FileInfo::file(
                    self.keys.from_key(&object.key),
                    object.size,
                    object.last_modified,
                ));
            }

            for common_prefix in page.common_prefixes {
                let dir_path = self.keys.from_key(common_prefix.trim_end_matches('/'));
                if dir_path == "/" || dir_path == normalized {
                    continue;
                }
                entries.push(FileInfo::directory(dir_path));
            }

            if !page.is_truncated {
                break;
            }
            marker = page.next_marker;
        }

        debug!(path = %normalized, entries = entries.len(), "listed directory");
        Ok(entries)
    }

    /// Visit every object under `path`.
    ///
    /// The descent issues delimiter-less paginated listings and calls
    /// `visit` once per discovered object, skipping zero-length directory
    /// markers. [`WalkOptions::start_after`] seeds the initial pagination
    /// marker so an interrupted walk can resume. The first visitor error
    /// aborts the walk and propagates; there is no partial-success value.
    pub async fn walk<F>(&self, path: &str, options: WalkOptions, mut visit: F) -> BlobFsResult<()>
    where
        F: FnMut(&FileInfo) -> BlobFsResult<()>,
    {
        let normalized = KeyMapper::normalize(path);
        let prefix = self.keys.to_prefix(path);
        let mut marker = options.start_after.as_deref().map(|p| self.keys.to_key(p));

        loop {
            let page = self
                .client
                .list(ListRequest {
                    prefix: prefix.clone(),
                    delimiter: None,
                    marker,
                    max_keys: LIST_MAX_KEYS,
                })
                .await
                .map_err(|e| e.with_path(normalized.clone()))?;

            for object in page.objects {
                if object.key.ends_with('/') {
                    continue;
                }
                let info = FileInfo::file(
                    self.keys.from_key(&object.key),
                    object.size,
                    object.last_modified,
                );
                visit(&info)?;
            }

            if !page.is_truncated {
                break;
            }
            marker = page.next_marker;
        }
        Ok(())
    }

    /// Move the object at `source` to `dest` through a server-side copy
    /// followed by a source delete.
    ///
    /// A failed copy leaves everything untouched. A failed delete after a
    /// successful copy triggers a best-effort rollback of the new
    /// destination object, so at most one live copy remains, and the
    /// original delete failure is what the caller sees.
    pub async fn rename(&self, source: &str, dest: &str) -> BlobFsResult<()> {
        let src_key = self.keys.to_key(source);
        let dst_key = self.keys.to_key(dest);
        debug!(source = %src_key, dest = %dst_key, "moving object");

        self.client
            .copy(&src_key, &dst_key)
            .await
            .map_err(|e| e.with_path(KeyMapper::normalize(source)))?;

        if let Err(err) = self.client.delete(&src_key).await {
            if let Err(rollback_err) = self.client.delete(&dst_key).await {
                warn!(
                    dest = %dst_key,
                    error = %rollback_err,
                    "failed to roll back copied object after delete failure"
                );
            }
            return Err(err.with_path(KeyMapper::normalize(source)));
        }
        Ok(())
    }

    /// Delete the object at `path`, or everything under it when the path
    /// is a directory.
    ///
    /// A path with no object and no prefixed children is a successful
    /// no-op, matching idempotent-delete semantics. Keys a batched round
    /// fails to remove surface as [`BlobFsError::PartialBatch`].
    pub async fn delete(&self, path: &str) -> BlobFsResult<()> {
        let normalized = KeyMapper::normalize(path);
        let key = self.keys.to_key(path);

        match self.client.head(&key).await {
            Ok(_) => {
                return self
                    .client
                    .delete(&key)
                    .await
                    .map_err(|e| e.with_path(normalized));
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.with_path(normalized)),
        }

        // No object at the key itself; sweep the subtree.
        let prefix = self.keys.to_prefix(path);
        let batch_limit = self.client.capabilities().batch_delete_limit.max(1);
        let mut marker = None;
        let mut removed = 0usize;

        loop {
            let page = self
                .client
                .list(ListRequest {
                    prefix: prefix.clone(),
                    delimiter: None,
                    marker,
                    max_keys: LIST_MAX_KEYS,
                })
                .await
                .map_err(|e| e.with_path(normalized.clone()))?;

            for batch in page.objects.chunks(batch_limit) {
                if batch.is_empty() {
                    continue;
                }
                removed += batch.len();
                let failed = self
                    .client
                    .delete_batch(batch.iter().map(|o| o.key.clone()).collect())
                    .await
                    .map_err(|e| e.with_path(normalized.clone()))?;
                if !failed.is_empty() {
                    return Err(BlobFsError::PartialBatch { failed });
                }
            }

            if !page.is_truncated {
                break;
            }
            marker = page.next_marker;
        }

        debug!(path = %normalized, removed, "recursive delete finished");
        Ok(())
    }

    /// Produce a presigned URL for direct reads of `path`, or `None` when
    /// the backend cannot sign requests
    pub async fn redirect_url(
        &self,
        path: &str,
        expires_in: Duration,
    ) -> BlobFsResult<Option<String>> {
        if !self.client.capabilities().presigned_urls {
            return Ok(None);
        }
        let key = self.keys.to_key(path);
        let url = self
            .client
            .presign_get(&key, expires_in)
            .await
            .map_err(|e| e.with_path(KeyMapper::normalize(path)))?;
        Ok(Some(url))
    }
}
