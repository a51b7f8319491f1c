//! Pooled region decoding for one image source.
//!
//! [`RegionDecodePool`] turns display-space tile requests into decoded,
//! orientation-corrected pixel buffers. Opening a decoder handle reads the
//! whole source stream, so handles are kept in a pool and reused across
//! decodes. The pool is safe to share between worker threads.
//!
//! # Decode steps
//!
//! 1. Bail out if the pool was destroyed.
//! 2. Take a pooled handle, or open a new one.
//! 3. Map the display rect to raw space through the EXIF orientation.
//! 4. Offer a reusable buffer. A rejected offer disables reuse for the
//!    rest of the pool's life and the decode is retried once without it.
//! 5. Return the handle (or close it if the pool was destroyed meanwhile).
//! 6. Drop the result if the pool was destroyed during the decode.
//! 7. Rotate/flip the raw pixels to display orientation and recycle the
//!    intermediate buffer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tilezoom_core::{BufferSpec, Orientation, PixelBuffer, Rect, Size};
use tracing::{debug, trace, warn};

use crate::allocator::BufferAllocator;
use crate::error::{DecodeError, DecodeResult};
use crate::region::{RegionDecoder, RegionDecoderFactory, output_spec};
use crate::source::ImageSource;

struct Handles {
    idle: Vec<Box<dyn RegionDecoder>>,
    destroyed: bool,
}

/// Counters for a decode pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodePoolStats {
    /// Decoder handles opened over the pool's life.
    pub opened: u64,
    /// Successful decodes.
    pub decoded: u64,
    /// Decodes that produced no buffer.
    pub failed: u64,
    /// Results dropped because the pool was destroyed mid-decode.
    pub discarded: u64,
}

/// Pool of region-decoder handles over one [`ImageSource`].
pub struct RegionDecodePool {
    source: Arc<dyn ImageSource>,
    factory: Arc<dyn RegionDecoderFactory>,
    allocator: Arc<dyn BufferAllocator>,
    orientation: Orientation,
    raw_size: Size,
    handles: Mutex<Handles>,
    reuse_disabled: AtomicBool,
    opened: AtomicU64,
    decoded: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

impl RegionDecodePool {
    /// Opens the first decoder handle for `source`.
    ///
    /// This is the only place a decode failure propagates: a source that
    /// cannot be opened at all fails here, once.
    pub fn open(
        source: Arc<dyn ImageSource>,
        factory: Arc<dyn RegionDecoderFactory>,
        allocator: Arc<dyn BufferAllocator>,
        orientation: Orientation,
    ) -> DecodeResult<Self> {
        let first = factory.open(source.as_ref())?;
        let raw_size = first.raw_size();
        if raw_size.is_empty() {
            return Err(DecodeError::open(source.key(), "image has no pixels"));
        }
        debug!(
            key = source.key(),
            raw = %raw_size,
            orientation = orientation.exif_value(),
            "opened region decode pool"
        );
        Ok(Self {
            source,
            factory,
            allocator,
            orientation,
            raw_size,
            handles: Mutex::new(Handles {
                idle: vec![first],
                destroyed: false,
            }),
            reuse_disabled: AtomicBool::new(false),
            opened: AtomicU64::new(1),
            decoded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Source identity.
    pub fn key(&self) -> &str {
        self.source.key()
    }

    /// Stored pixel size.
    pub fn raw_size(&self) -> Size {
        self.raw_size
    }

    /// Orientation-corrected size: the space tiles are planned in.
    pub fn display_size(&self) -> Size {
        self.orientation.display_size(self.raw_size)
    }

    /// Orientation applied to decoded pixels.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Allocator shared with the buffers this pool produces.
    pub fn allocator(&self) -> &Arc<dyn BufferAllocator> {
        &self.allocator
    }

    /// Returns `true` once allocation reuse has been switched off.
    pub fn reuse_disabled(&self) -> bool {
        self.reuse_disabled.load(Ordering::Acquire)
    }

    /// Returns `true` after [`destroy`](Self::destroy).
    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Number of idle handles in the pool.
    pub fn idle_handles(&self) -> usize {
        self.lock().idle.len()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> DecodePoolStats {
        DecodePoolStats {
            opened: self.opened.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    /// Decodes `rect` (display space) downsampled by `sample_size`.
    ///
    /// Returns `None` when the pool is destroyed, the region is invalid or
    /// the decoder fails. Failures are logged, never returned.
    pub fn decode(&self, rect: Rect, sample_size: u32) -> Option<PixelBuffer> {
        let mut handle = self.acquire()?;
        let raw = self.decode_raw(handle.as_mut(), rect, sample_size);
        let destroyed = self.release(handle);

        let raw = match raw {
            Some(raw) => raw,
            None => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        if destroyed {
            debug!(key = self.key(), %rect, "pool destroyed during decode, dropping result");
            self.discarded.fetch_add(1, Ordering::Relaxed);
            self.allocator.recycle(raw);
            return None;
        }

        let display = self.apply_orientation(raw);
        self.decoded.fetch_add(1, Ordering::Relaxed);
        Some(display)
    }

    /// Closes every pooled handle and refuses further decodes.
    ///
    /// Decodes already running finish, then close their handle and drop
    /// their result.
    pub fn destroy(&self) {
        let mut handles = self.lock();
        if handles.destroyed {
            return;
        }
        handles.destroyed = true;
        let closed = handles.idle.len();
        handles.idle.clear();
        debug!(key = self.key(), closed, "destroyed region decode pool");
    }

    fn acquire(&self) -> Option<Box<dyn RegionDecoder>> {
        {
            let mut handles = self.lock();
            if handles.destroyed {
                trace!(key = self.key(), "decode skipped, pool destroyed");
                return None;
            }
            if let Some(handle) = handles.idle.pop() {
                return Some(handle);
            }
        }

        match self.factory.open(self.source.as_ref()) {
            Ok(handle) => {
                self.opened.fetch_add(1, Ordering::Relaxed);
                trace!(key = self.key(), "opened extra decoder handle");
                Some(handle)
            }
            Err(err) => {
                warn!(key = self.key(), error = %err, "failed to open decoder handle");
                None
            }
        }
    }

    /// Returns the handle to the pool. Returns `true` if the pool was
    /// destroyed, in which case the handle is closed instead.
    fn release(&self, handle: Box<dyn RegionDecoder>) -> bool {
        let mut handles = self.lock();
        if handles.destroyed {
            drop(handle);
            true
        } else {
            handles.idle.push(handle);
            false
        }
    }

    fn decode_raw(
        &self,
        handle: &mut dyn RegionDecoder,
        rect: Rect,
        sample_size: u32,
    ) -> Option<PixelBuffer> {
        let raw_rect = self.orientation.display_rect_to_raw(rect, self.raw_size);
        let spec = output_spec(raw_rect, sample_size, handle.output_format());
        let mut reuse = if self.reuse_disabled() {
            None
        } else {
            self.allocator.try_reuse(spec)
        };
        trace!(
            key = self.key(),
            %rect,
            %raw_rect,
            sample_size,
            reuse = reuse.is_some(),
            "decoding region"
        );

        let offered = reuse.is_some();
        let result = match handle.decode_region(raw_rect, sample_size, &mut reuse) {
            Err(err) if offered && err.is_reuse_error() => {
                self.reuse_disabled.store(true, Ordering::Release);
                warn!(key = self.key(), error = %err, "buffer reuse failed, disabling reuse");
                if let Some(rejected) = reuse.take() {
                    self.allocator.recycle(rejected);
                }
                handle.decode_region(raw_rect, sample_size, &mut None)
            }
            other => other,
        };
        if let Some(unused) = reuse.take() {
            self.allocator.recycle(unused);
        }

        match result {
            Ok(buffer) => Some(buffer),
            Err(err) if err.is_bounds_error() => {
                warn!(
                    key = self.key(),
                    raw = %self.raw_size,
                    %raw_rect,
                    sample_size,
                    error = %err,
                    "region outside image"
                );
                None
            }
            Err(err) => {
                warn!(key = self.key(), %raw_rect, sample_size, error = %err, "region decode failed");
                None
            }
        }
    }

    fn apply_orientation(&self, raw: PixelBuffer) -> PixelBuffer {
        if self.orientation.is_identity() {
            return raw;
        }
        let display = self.orientation.display_size(raw.size());
        let spec = BufferSpec::new(display.width, display.height, raw.format());
        let mut out = if self.reuse_disabled() {
            PixelBuffer::new(spec)
        } else {
            self.allocator.allocate(spec)
        };
        match self.orientation.apply_into(&raw, &mut out) {
            Ok(()) => {
                self.allocator.recycle(raw);
                out
            }
            Err(err) => {
                warn!(key = self.key(), error = %err, "orientation correction failed");
                self.allocator.recycle(out);
                raw
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RegionDecodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionDecodePool")
            .field("key", &self.key())
            .field("raw_size", &self.raw_size)
            .field("orientation", &self.orientation)
            .field("reuse_disabled", &self.reuse_disabled())
            .finish()
    }
}
