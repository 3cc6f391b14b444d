use bytes::BytesMut;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    BlobFsError, BlobFsResult, BufferPool, CompletedPart, ObjectClient,
};

/// Lifecycle of a [`FileWriter`].
///
/// One tagged state with enumerated legal transitions, instead of
/// independent closed/committed/cancelled flags that can drift apart.
/// Illegal transitions are rejected uniformly with
/// [`BlobFsError::InvalidState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Accepting writes; buffering and flushing parts
    Open,
    /// Finalized; the object is visible at the key
    Committed,
    /// Aborted; buffered bytes discarded
    Cancelled,
    /// Local resources released without touching the backend session
    Closed,
}

/// Backend-side incremental upload owned by exactly one writer
struct UploadSession {
    upload_id: String,
    parts: Vec<CompletedPart>,
}

/// Buffered writer that stores its content at one key on commit.
///
/// Bytes accumulate in a pooled buffer; every full chunk is flushed as one
/// numbered part of an incremental upload. The upload session is initiated
/// lazily on the first full-chunk flush, so content smaller than one chunk
/// commits through a single whole-object put and never opens a session.
///
/// A writer must be driven by one logical caller at a time; the `&mut`
/// receivers enforce that within safe code. An abandoned writer that
/// flushed at least one part leaves an open session on the backend, so
/// error paths must call [`FileWriter::cancel`].
pub struct FileWriter {
    client: Arc<dyn ObjectClient>,
    pool: Arc<BufferPool>,
    key: String,
    chunk_size: usize,
    state: WriterState,
    buffer: Option<BytesMut>,
    session: Option<UploadSession>,
    flushed: u64,
}

impl FileWriter {
    pub(crate) fn new(
        client: Arc<dyn ObjectClient>,
        pool: Arc<BufferPool>,
        key: String,
        chunk_size: usize,
    ) -> Self {
        let buffer = pool.acquire();
        Self {
            client,
            pool,
            key,
            chunk_size,
            state: WriterState::Open,
            buffer: Some(buffer),
            session: None,
            flushed: 0,
        }
    }

    /// Append bytes, flushing one chunk-sized part per full chunk.
    ///
    /// A single call may upload several parts when it carries more than
    /// one chunk's worth of data.
    pub async fn write(&mut self, data: &[u8]) -> BlobFsResult<()> {
        self.guard_open()?;
        self.buffer
            .as_mut()
            .ok_or_else(|| BlobFsError::invalid_state("writer buffer released"))?
            .extend_from_slice(data);

        while self.buffered() >= self.chunk_size {
            self.flush_chunk().await?;
        }
        Ok(())
    }

    /// Finalize the upload and make the object visible at the key.
    ///
    /// Without an open session the whole buffer goes out as one put, the
    /// single-shot path; zero buffered bytes still produce a zero-length
    /// object. With a session, any remainder is flushed as a short final
    /// part and the session completes with the accumulated parts in
    /// ascending order. Not idempotent: a second commit fails.
    pub async fn commit(&mut self) -> BlobFsResult<()> {
        self.guard_open()?;

        if self.session.is_none() {
            let buffer = self
                .buffer
                .as_mut()
                .ok_or_else(|| BlobFsError::invalid_state("writer buffer released"))?;
            let body = buffer.split().freeze();
            self.flushed += body.len() as u64;
            debug!(key = %self.key, bytes = body.len(), "single-shot commit");
            self.client.put(&self.key, body).await?;
        } else {
            if self.buffered() > 0 {
                self.flush_remainder().await?;
            }
            let session = self.session.as_ref().expect("session checked above");
            debug!(
                key = %self.key,
                upload_id = %session.upload_id,
                parts = session.parts.len(),
                "completing incremental upload"
            );
            self.client
                .complete_upload(&self.key, &session.upload_id, &session.parts)
                .await?;
        }

        self.state = WriterState::Committed;
        self.release_buffer();
        Ok(())
    }

    /// Abort the backend session, if any, and discard buffered bytes.
    ///
    /// The abort is best effort: a failure is reported in the log but the
    /// writer still transitions, so the caller can treat cancellation as
    /// final. Cancelling twice is a no-op.
    pub async fn cancel(&mut self) -> BlobFsResult<()> {
        match self.state {
            WriterState::Open => {}
            WriterState::Cancelled => return Ok(()),
            _ => return Err(self.state_error()),
        }

        if let Some(session) = self.session.take() {
            if let Err(err) = self.client.abort_upload(&self.key, &session.upload_id).await {
                warn!(
                    key = %self.key,
                    upload_id = %session.upload_id,
                    error = %err,
                    "failed to abort incremental upload"
                );
            }
        }

        self.state = WriterState::Cancelled;
        self.release_buffer();
        Ok(())
    }

    /// Release local resources without touching the backend session.
    /// Idempotent.
    pub fn close(&mut self) {
        self.release_buffer();
        if self.state == WriterState::Open {
            self.state = WriterState::Closed;
        }
    }

    /// Total bytes accepted so far, buffered plus flushed, valid in every
    /// state
    pub fn size(&self) -> u64 {
        self.flushed + self.buffered() as u64
    }

    fn buffered(&self) -> usize {
        self.buffer.as_ref().map(BytesMut::len).unwrap_or(0)
    }

    async fn flush_chunk(&mut self) -> BlobFsResult<()> {
        let chunk = self
            .buffer
            .as_mut()
            .ok_or_else(|| BlobFsError::invalid_state("writer buffer released"))?
            .split_to(self.chunk_size)
            .freeze();
        self.upload_part(chunk).await
    }

    async fn flush_remainder(&mut self) -> BlobFsResult<()> {
        let chunk = self
            .buffer
            .as_mut()
            .ok_or_else(|| BlobFsError::invalid_state("writer buffer released"))?
            .split()
            .freeze();
        self.upload_part(chunk).await
    }

    async fn upload_part(&mut self, chunk: bytes::Bytes) -> BlobFsResult<()> {
        if self.session.is_none() {
            let upload_id = self.client.create_upload(&self.key).await?;
            debug!(key = %self.key, upload_id = %upload_id, "initiated incremental upload");
            self.session = Some(UploadSession {
                upload_id,
                parts: Vec::new(),
            });
        }

        let session = self.session.as_mut().expect("session initiated above");
        let part_number = session.parts.len() as u32 + 1;
        let size = chunk.len() as u64;
        let etag = self
            .client
            .upload_part(&self.key, &session.upload_id, part_number, chunk)
            .await?;

        session.parts.push(CompletedPart { part_number, etag });
        self.flushed += size;
        Ok(())
    }

    fn guard_open(&self) -> BlobFsResult<()> {
        if self.state == WriterState::Open {
            Ok(())
        } else {
            Err(self.state_error())
        }
    }

    fn state_error(&self) -> BlobFsError {
        match self.state {
            WriterState::Open => BlobFsError::invalid_state("writer is open"),
            WriterState::Committed => BlobFsError::invalid_state("writer already committed"),
            WriterState::Cancelled => BlobFsError::invalid_state("writer already cancelled"),
            WriterState::Closed => BlobFsError::invalid_state("writer already closed"),
        }
    }

    fn release_buffer(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        self.release_buffer();
    }
}
