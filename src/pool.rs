use bytes::BytesMut;
use parking_lot::Mutex;

const MAX_POOLED: usize = 8;

/// Reusable pool of chunk-sized write buffers.
///
/// Purely an allocation optimization for [`crate::FileWriter`]; a fresh
/// buffer is handed out whenever the pool runs dry, so correctness never
/// depends on it.
pub struct BufferPool {
    chunk_size: usize,
    buffers: Mutex<Vec<BytesMut>>,
}

impl BufferPool {
    /// Create a pool handing out buffers sized for one upload part
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            buffers: Mutex::new(Vec::new()),
        }
    }

    /// Take a cleared buffer from the pool, allocating when empty
    pub fn acquire(&self) -> BytesMut {
        self.buffers
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.chunk_size))
    }

    /// Return a buffer for reuse; excess buffers are dropped
    pub fn release(&self, mut buffer: BytesMut) {
        buffer.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < MAX_POOLED {
            buffers.push(buffer);
        }
    }
}
