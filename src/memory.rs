use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    BatchFailure, BlobFsError, BlobFsResult, ByteStream, ClientCapabilities, CompletedPart,
    ListPage, ListRequest, ObjectClient, ObjectHead, ObjectSummary,
};

struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

struct UploadState {
    key: String,
    parts: BTreeMap<u32, (String, Bytes)>,
}

/// In-memory backend for testing and development.
///
/// Implements the full [`ObjectClient`] surface over a sorted keyspace,
/// including real prefix, delimiter, marker and max-keys listing
/// semantics, so pagination behaves the way a live backend paginates.
/// Failure-injection hooks let tests drive the driver's error paths.
pub struct MemoryClient {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    uploads: RwLock<HashMap<String, UploadState>>,
    completed_parts: RwLock<HashMap<String, u32>>,
    fail_next_copy: Mutex<bool>,
    fail_delete: Mutex<HashSet<String>>,
    fail_batch: Mutex<HashSet<String>>,
    page_limit: Option<usize>,
    batch_delete_limit: usize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            uploads: RwLock::new(HashMap::new()),
            completed_parts: RwLock::new(HashMap::new()),
            fail_next_copy: Mutex::new(false),
            fail_delete: Mutex::new(HashSet::new()),
            fail_batch: Mutex::new(HashSet::new()),
            page_limit: None,
            batch_delete_limit: 1000,
        }
    }

    /// Cap every listing response at `limit` entries, regardless of the
    /// requested max-keys, to exercise pagination with small pages
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit.max(1));
        self
    }

    /// Override the advertised per-request batch delete limit
    pub fn with_batch_delete_limit(mut self, limit: usize) -> Self {
        self.batch_delete_limit = limit.max(1);
        self
    }

    /// Make the next copy request fail
    pub fn fail_next_copy(&self) {
        *self.fail_next_copy.lock() = true;
    }

    /// Make every single-object delete of `key` fail
    pub fn fail_delete_of(&self, key: &str) {
        self.fail_delete.lock().insert(key.to_string());
    }

    /// Make batched deletes report `key` as failed
    pub fn fail_batch_delete_of(&self, key: &str) {
        self.fail_batch.lock().insert(key.to_string());
    }

    /// Seed an object directly into the keyspace
    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified: Utc::now(),
            },
        );
    }

    /// Raw content stored under `key`, bypassing any path mapping
    pub fn raw(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|o| o.data.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Incremental upload sessions that were initiated but neither
    /// completed nor aborted
    pub fn open_upload_count(&self) -> usize {
        self.uploads.read().len()
    }

    /// How many parts the last completed upload of `key` carried
    pub fn completed_part_count(&self, key: &str) -> Option<u32> {
        self.completed_parts.read().get(key).copied()
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

enum ListEntry {
    Object(String),
    Prefix(String),
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn get(&self, key: &str, offset: u64) -> BlobFsResult<ByteStream> {
        let objects = self.objects.read();
        let stored = objects
            .get(key)
            .ok_or_else(|| BlobFsError::not_found(key))?;
        if offset > stored.data.len() as u64 {
            return Err(BlobFsError::backend(
                "InvalidRange",
                format!("offset {} beyond object of {} bytes", offset, stored.data.len()),
            ));
        }
        let body = stored.data.slice(offset as usize..);
        Ok(Box::pin(futures_util::stream::iter(vec![Ok(body)])))
    }

    async fn put(&self, key: &str, body: Bytes) -> BlobFsResult<()> {
        self.insert(key, body);
        Ok(())
    }

    async fn head(&self, key: &str) -> BlobFsResult<ObjectHead> {
        let objects = self.objects.read();
        let stored = objects
            .get(key)
            .ok_or_else(|| BlobFsError::not_found(key))?;
        Ok(ObjectHead {
            size: stored.data.len() as u64,
            last_modified: Some(stored.last_modified),
            etag: None,
        })
    }

    async fn list(&self, request: ListRequest) -> BlobFsResult<ListPage> {
        let objects = self.objects.read();
        let max_keys = match self.page_limit {
            Some(cap) => request.max_keys.max(1).min(cap),
            None => request.max_keys.max(1),
        };
        let marker = request.marker.unwrap_or_default();

        // Materialize the grouped entry sequence the way a real backend
        // would order it, then cut one page out of it.
        let mut entries: Vec<ListEntry> = Vec::new();
        let mut last_prefix: Option<String> = None;
        for key in objects
            .range(request.prefix.clone()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(&request.prefix))
        {
            let rolled_up = request.delimiter.as_ref().and_then(|delim| {
                key[request.prefix.len()..]
                    .find(delim.as_str())
                    .map(|idx| key[..request.prefix.len() + idx + delim.len()].to_string())
            });

            match rolled_up {
                Some(common_prefix) => {
                    // Entries at or before the marker were already served.
                    if common_prefix.as_str() <= marker.as_str() {
                        continue;
                    }
                    if last_prefix.as_deref() == Some(common_prefix.as_str()) {
                        continue;
                    }
                    last_prefix = Some(common_prefix.clone());
                    entries.push(ListEntry::Prefix(common_prefix));
                }
                None => {
                    if key.as_str() <= marker.as_str() {
                        continue;
                    }
                    entries.push(ListEntry::Object(key.clone()));
                }
            }
        }

        let is_truncated = entries.len() > max_keys;
        entries.truncate(max_keys);

        let mut page = ListPage {
            is_truncated,
            ..ListPage::default()
        };
        for entry in entries {
            match entry {
                ListEntry::Object(key) => {
                    let stored = &objects[&key];
                    page.next_marker = Some(key.clone());
                    page.objects.push(ObjectSummary {
                        key,
                        size: stored.data.len() as u64,
                        last_modified: Some(stored.last_modified),
                    });
                }
                ListEntry::Prefix(prefix) => {
                    page.next_marker = Some(prefix.clone());
                    page.common_prefixes.push(prefix);
                }
            }
        }
        if !page.is_truncated {
            page.next_marker = None;
        }
        Ok(page)
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> BlobFsResult<()> {
        if std::mem::take(&mut *self.fail_next_copy.lock()) {
            return Err(BlobFsError::backend("InternalError", "injected copy failure"));
        }
        let data = {
            let objects = self.objects.read();
            objects
                .get(src_key)
                .ok_or_else(|| BlobFsError::not_found(src_key))?
                .data
                .clone()
        };
        self.insert(dst_key, data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> BlobFsResult<()> {
        if self.fail_delete.lock().contains(key) {
            return Err(BlobFsError::backend("InternalError", "injected delete failure"));
        }
        // Deleting a missing key succeeds, matching backend semantics.
        self.objects.write().remove(key);
        Ok(())
    }

    async fn delete_batch(&self, keys: Vec<String>) -> BlobFsResult<Vec<BatchFailure>> {
        let failing = self.fail_batch.lock();
        let mut objects = self.objects.write();
        let mut failed = Vec::new();
        for key in keys {
            if failing.contains(&key) {
                failed.push(BatchFailure {
                    key,
                    code: "InternalError".to_string(),
                    message: "injected batch failure".to_string(),
                });
                continue;
            }
            objects.remove(&key);
        }
        Ok(failed)
    }

    async fn create_upload(&self, key: &str) -> BlobFsResult<String> {
        let upload_id = format!("upl_{}", Uuid::new_v4().simple());
        self.uploads.write().insert(
            upload_id.clone(),
            UploadState {
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> BlobFsResult<String> {
        let mut uploads = self.uploads.write();
        let state = uploads
            .get_mut(upload_id)
            .ok_or_else(|| BlobFsError::backend("NoSuchUpload", upload_id))?;
        let etag = format!("\"mem-{}-{}\"", part_number, body.len());
        state.parts.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    async fn complete_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> BlobFsResult<()> {
        let state = self
            .uploads
            .write()
            .remove(upload_id)
            .ok_or_else(|| BlobFsError::backend("NoSuchUpload", upload_id))?;

        let mut assembled = Vec::new();
        let mut previous = 0u32;
        for part in parts {
            if part.part_number <= previous {
                return Err(BlobFsError::backend(
                    "InvalidPartOrder",
                    format!("part {} out of order", part.part_number),
                ));
            }
            previous = part.part_number;
            let (etag, data) = state
                .parts
                .get(&part.part_number)
                .ok_or_else(|| {
                    BlobFsError::backend("InvalidPart", format!("part {} missing", part.part_number))
                })?;
            if etag != &part.etag {
                return Err(BlobFsError::backend(
                    "InvalidPart",
                    format!("part {} etag mismatch", part.part_number),
                ));
            }
            assembled.extend_from_slice(data);
        }

        self.completed_parts
            .write()
            .insert(key.to_string(), parts.len() as u32);
        self.insert(&state.key, assembled);
        Ok(())
    }

    async fn abort_upload(&self, _key: &str, upload_id: &str) -> BlobFsResult<()> {
        self.uploads
            .write()
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| BlobFsError::backend("NoSuchUpload", upload_id))
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobFsResult<String> {
        Ok(format!("memory://{}?expires={}", key, expires_in.as_secs()))
    }

    fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities::default()
            .with_presigned_urls()
            .with_batch_delete_limit(self.batch_delete_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(keys: &[&str]) -> MemoryClient {
        let client = MemoryClient::new();
        for key in keys {
            client.insert(key, Bytes::from_static(b"x"));
        }
        client
    }

    #[tokio::test]
    async fn delimited_listing_groups_prefixes() {
        let client = client_with(&["a/b/1", "a/b/2", "a/c", "a/d/1", "b"]);
        let page = client
            .list(ListRequest {
                prefix: "a/".to_string(),
                delimiter: Some("/".to_string()),
                marker: None,
                max_keys: 1000,
            })
            .await
            .unwrap();

        let keys: Vec<_> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a/c"]);
        assert_eq!(page.common_prefixes, vec!["a/b/", "a/d/"]);
        assert!(!page.is_truncated);
        assert!(page.next_marker.is_none());
    }

    #[tokio::test]
    async fn paginated_listing_never_duplicates() {
        let client = client_with(&["a/b/1", "a/b/2", "a/c", "a/d/1", "a/e", "a/f"]).with_page_limit(2);

        let mut marker = None;
        let mut objects = Vec::new();
        let mut prefixes = Vec::new();
        loop {
            let page = client
                .list(ListRequest {
                    prefix: "a/".to_string(),
                    delimiter: Some("/".to_string()),
                    marker,
                    max_keys: 1000,
                })
                .await
                .unwrap();
            objects.extend(page.objects.iter().map(|o| o.key.clone()));
            prefixes.extend(page.common_prefixes.clone());
            if !page.is_truncated {
                break;
            }
            marker = page.next_marker;
        }

        assert_eq!(objects, vec!["a/c", "a/e", "a/f"]);
        assert_eq!(prefixes, vec!["a/b/", "a/d/"]);
    }

    #[tokio::test]
    async fn multipart_round_trip_assembles_in_order() {
        let client = MemoryClient::new();
        let upload_id = client.create_upload("k").await.unwrap();
        let e1 = client
            .upload_part("k", &upload_id, 1, Bytes::from_static(b"hello "))
            .await
            .unwrap();
        let e2 = client
            .upload_part("k", &upload_id, 2, Bytes::from_static(b"world"))
            .await
            .unwrap();
        client
            .complete_upload(
                "k",
                &upload_id,
                &[
                    CompletedPart { part_number: 1, etag: e1 },
                    CompletedPart { part_number: 2, etag: e2 },
                ],
            )
            .await
            .unwrap();

        assert_eq!(client.raw("k").unwrap(), Bytes::from_static(b"hello world"));
        assert_eq!(client.open_upload_count(), 0);
    }
}
