//! Pixel buffer allocation and reuse.
//!
//! Decoders can write into a previously freed buffer of the same shape
//! instead of allocating. [`BufferAllocator`] is that capability;
//! [`FreshAllocator`] opts out and [`BufferPool`] keeps freed buffers keyed
//! by [`BufferSpec`] up to a byte limit.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tilezoom_core::{BufferSpec, PixelBuffer};
use tracing::trace;

/// Source of pixel buffers and sink for freed ones.
pub trait BufferAllocator: Send + Sync {
    /// Returns a previously freed buffer of exactly `spec`, if one exists.
    ///
    /// Contents are unspecified; callers overwrite every byte.
    fn try_reuse(&self, spec: BufferSpec) -> Option<PixelBuffer>;

    /// Takes ownership of a buffer that is no longer referenced.
    fn recycle(&self, buffer: PixelBuffer);

    /// Reuses a buffer when possible, otherwise allocates a zeroed one.
    fn allocate(&self, spec: BufferSpec) -> PixelBuffer {
        self.try_reuse(spec).unwrap_or_else(|| PixelBuffer::new(spec))
    }
}

/// Allocator that never reuses: every buffer is fresh, every recycle frees.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreshAllocator;

impl BufferAllocator for FreshAllocator {
    fn try_reuse(&self, _spec: BufferSpec) -> Option<PixelBuffer> {
        None
    }

    fn recycle(&self, buffer: PixelBuffer) {
        drop(buffer);
    }
}

/// Default pool limit in bytes (32MB).
pub const DEFAULT_POOL_SIZE: usize = 32 * 1024 * 1024;

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// `try_reuse` calls answered from the pool.
    pub hits: u64,
    /// `try_reuse` calls with no matching buffer.
    pub misses: u64,
    /// Buffers accepted by `recycle`.
    pub recycled: u64,
    /// Buffers freed because the pool was full.
    pub dropped: u64,
    /// Bytes currently held.
    pub bytes: usize,
}

impl PoolStats {
    /// Fraction of reuse requests that were served.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct PoolInner {
    free: HashMap<BufferSpec, Vec<PixelBuffer>>,
    stats: PoolStats,
}

/// Thread-safe pool of freed buffers keyed by shape.
pub struct BufferPool {
    max_bytes: usize,
    inner: Mutex<PoolInner>,
}

impl BufferPool {
    /// Creates a pool holding at most `max_bytes` of free buffers.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// Byte limit.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> PoolStats {
        self.lock().stats
    }

    /// Number of free buffers of `spec`.
    pub fn available(&self, spec: BufferSpec) -> usize {
        self.lock().free.get(&spec).map_or(0, Vec::len)
    }

    /// Frees every pooled buffer.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.free.clear();
        inner.stats.bytes = 0;
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl BufferAllocator for BufferPool {
    fn try_reuse(&self, spec: BufferSpec) -> Option<PixelBuffer> {
        let mut inner = self.lock();
        let buffer = inner.free.get_mut(&spec).and_then(Vec::pop);
        match &buffer {
            Some(buf) => {
                inner.stats.hits += 1;
                inner.stats.bytes -= buf.byte_len();
            }
            None => inner.stats.misses += 1,
        }
        buffer
    }

    fn recycle(&self, buffer: PixelBuffer) {
        let len = buffer.byte_len();
        let mut inner = self.lock();
        if inner.stats.bytes + len > self.max_bytes {
            inner.stats.dropped += 1;
            trace!(spec = %buffer.spec(), "buffer pool full, freeing");
            return;
        }
        inner.stats.recycled += 1;
        inner.stats.bytes += len;
        inner.free.entry(buffer.spec()).or_default().push(buffer);
    }
}
