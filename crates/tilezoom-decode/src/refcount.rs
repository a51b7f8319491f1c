//! Decoded buffers with independent owner classes.
//!
//! A [`RefCountedBuffer`] stays alive while any of three reasons holds it:
//! a memory cache entry, an on-screen draw, or a consumer that has not yet
//! picked it up. Each class has its own counter. When the total first
//! reaches zero the pixels go back to the allocator and the buffer is
//! released for good.
//!
//! ```text
//! buffer.is_some()  <=>  cache + display + pending > 0
//! ```
//!
//! All counter changes and buffer reads for one instance are serialized
//! by a single mutex. There is no lock shared between instances.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tilezoom_core::{BufferSpec, PixelBuffer};
use tracing::{debug, trace, warn};

use crate::allocator::BufferAllocator;

/// Reason an owner is holding a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefClass {
    /// Held by a memory cache entry.
    Cache,
    /// Currently drawn.
    Display,
    /// Waiting to be installed or used.
    Pending,
}

/// Snapshot of the three counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefCounts {
    /// Cache references.
    pub cache: u32,
    /// Display references.
    pub display: u32,
    /// Pending-use references.
    pub pending: u32,
}

impl RefCounts {
    /// Sum of all classes.
    #[inline]
    pub fn total(&self) -> u32 {
        self.cache + self.display + self.pending
    }

    fn slot(&mut self, class: RefClass) -> &mut u32 {
        match class {
            RefClass::Cache => &mut self.cache,
            RefClass::Display => &mut self.display,
            RefClass::Pending => &mut self.pending,
        }
    }
}

struct RefState {
    buffer: Option<PixelBuffer>,
    counts: RefCounts,
}

/// Pixel buffer shared by several owners, released exactly once.
pub struct RefCountedBuffer {
    key: String,
    spec: BufferSpec,
    allocator: Arc<dyn BufferAllocator>,
    state: Mutex<RefState>,
}

impl RefCountedBuffer {
    /// Wraps `buffer` with one reference of class `initial`.
    pub fn new(
        key: impl Into<String>,
        buffer: PixelBuffer,
        allocator: Arc<dyn BufferAllocator>,
        initial: RefClass,
    ) -> Self {
        let mut counts = RefCounts::default();
        *counts.slot(initial) = 1;
        Self {
            key: key.into(),
            spec: buffer.spec(),
            allocator,
            state: Mutex::new(RefState {
                buffer: Some(buffer),
                counts,
            }),
        }
    }

    /// Stable identity for logging.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Shape of the pixels (kept after release).
    pub fn spec(&self) -> BufferSpec {
        self.spec
    }

    /// Adds or drops a cache reference.
    pub fn set_cached(&self, owner: &str, cached: bool) {
        self.set(RefClass::Cache, owner, cached);
    }

    /// Adds or drops a display reference.
    pub fn set_displayed(&self, owner: &str, displayed: bool) {
        self.set(RefClass::Display, owner, displayed);
    }

    /// Adds or drops a pending-use reference.
    pub fn set_pending(&self, owner: &str, pending: bool) {
        self.set(RefClass::Pending, owner, pending);
    }

    /// Adds (`active`) or drops a reference of `class` on behalf of `owner`.
    ///
    /// Dropping a class already at zero is a no-op. Adding to a released
    /// buffer is refused, since released pixels can never come back.
    pub fn set(&self, class: RefClass, owner: &str, active: bool) {
        let mut state = self.lock();
        if state.buffer.is_none() {
            if active {
                warn!(key = %self.key, owner, ?class, "reference added to released buffer");
            } else {
                trace!(key = %self.key, owner, ?class, "reference dropped on released buffer");
            }
            return;
        }

        let slot = state.counts.slot(class);
        if active {
            *slot += 1;
        } else if *slot > 0 {
            *slot -= 1;
        } else {
            return;
        }

        let counts = state.counts;
        if counts.total() == 0 {
            if let Some(buffer) = state.buffer.take() {
                self.allocator.recycle(buffer);
            }
            debug!(key = %self.key, owner, "released buffer");
        } else {
            trace!(
                key = %self.key,
                owner,
                cache = counts.cache,
                display = counts.display,
                pending = counts.pending,
                "buffer still referenced"
            );
        }
    }

    /// Current counters.
    pub fn counts(&self) -> RefCounts {
        self.lock().counts
    }

    /// Returns `true` once the pixels have gone back to the allocator.
    pub fn is_released(&self) -> bool {
        self.lock().buffer.is_none()
    }

    /// Runs `f` on the pixels, or returns `None` if released.
    ///
    /// The instance lock is held for the duration of `f`, so `f` must not
    /// call back into this buffer.
    pub fn try_with_buffer<R>(&self, f: impl FnOnce(&PixelBuffer) -> R) -> Option<R> {
        let state = self.lock();
        state.buffer.as_ref().map(f)
    }

    /// Runs `f` on the pixels.
    ///
    /// # Panics
    ///
    /// Panics if the buffer was already released. Owners must hold a
    /// reference while reading.
    pub fn with_buffer<R>(&self, f: impl FnOnce(&PixelBuffer) -> R) -> R {
        match self.try_with_buffer(f) {
            Some(r) => r,
            None => panic!("buffer {} read after release", self.key),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RefCountedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("RefCountedBuffer")
            .field("key", &self.key)
            .field("spec", &self.spec)
            .field("counts", &state.counts)
            .field("released", &state.buffer.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::BufferPool;
    use proptest::prelude::*;
    use tilezoom_core::PixelFormat;

    fn buffer() -> PixelBuffer {
        PixelBuffer::new(BufferSpec::new(4, 4, PixelFormat::Rgba8))
    }

    fn pooled(initial: RefClass) -> (Arc<BufferPool>, RefCountedBuffer) {
        let pool = Arc::new(BufferPool::new(1 << 20));
        let buf = RefCountedBuffer::new("tile", buffer(), pool.clone(), initial);
        (pool, buf)
    }

    #[test]
    fn starts_with_one_reference() {
        let (_, buf) = pooled(RefClass::Pending);
        assert_eq!(buf.counts(), RefCounts { cache: 0, display: 0, pending: 1 });
        assert!(!buf.is_released());
    }

    #[test]
    fn releases_to_pool_when_all_drop() {
        let (pool, buf) = pooled(RefClass::Pending);
        buf.set_cached("cache", true);
        buf.set_pending("manager", false);
        assert!(!buf.is_released());
        buf.set_displayed("renderer", true);
        buf.set_cached("cache", false);
        assert!(!buf.is_released());
        buf.set_displayed("renderer", false);
        assert!(buf.is_released());
        assert_eq!(pool.stats().recycled, 1);
    }

    #[test]
    fn decrement_below_zero_is_noop() {
        let (_, buf) = pooled(RefClass::Cache);
        buf.set_displayed("renderer", false);
        buf.set_pending("manager", false);
        assert_eq!(buf.counts().cache, 1);
        assert!(!buf.is_released());
    }

    #[test]
    fn release_is_final() {
        let (pool, buf) = pooled(RefClass::Display);
        buf.set_displayed("renderer", false);
        buf.set_displayed("renderer", true);
        buf.set_cached("cache", true);
        assert!(buf.is_released());
        assert_eq!(buf.counts().total(), 0);
        assert_eq!(pool.stats().recycled, 1);
    }

    #[test]
    fn try_with_buffer_after_release() {
        let (_, buf) = pooled(RefClass::Pending);
        assert_eq!(buf.try_with_buffer(|b| b.width()), Some(4));
        buf.set_pending("manager", false);
        assert_eq!(buf.try_with_buffer(|b| b.width()), None);
    }

    #[test]
    #[should_panic(expected = "read after release")]
    fn with_buffer_after_release_panics() {
        let (_, buf) = pooled(RefClass::Pending);
        buf.set_pending("manager", false);
        buf.with_buffer(|b| b.width());
    }

    #[test]
    fn concurrent_owners_release_once() {
        let pool = Arc::new(BufferPool::new(1 << 20));
        let buf = Arc::new(RefCountedBuffer::new("shared", buffer(), pool.clone(), RefClass::Pending));
        for _ in 0..7 {
            buf.set_displayed("setup", true);
        }
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let buf = Arc::clone(&buf);
                std::thread::spawn(move || {
                    if i == 0 {
                        buf.set_pending("worker", false);
                    } else {
                        buf.set_displayed("worker", false);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(buf.is_released());
        assert_eq!(pool.stats().recycled, 1);
    }

    fn class() -> impl Strategy<Value = RefClass> {
        prop_oneof![
            Just(RefClass::Cache),
            Just(RefClass::Display),
            Just(RefClass::Pending)
        ]
    }

    proptest! {
        #[test]
        fn buffer_present_iff_referenced(
            initial in class(),
            ops in prop::collection::vec((class(), any::<bool>()), 0..64),
        ) {
            let pool = Arc::new(BufferPool::new(1 << 20));
            let buf = RefCountedBuffer::new("prop", buffer(), pool.clone(), initial);
            let mut released_seen = false;
            for (class, active) in ops {
                buf.set(class, "prop", active);
                let total = buf.counts().total();
                prop_assert_eq!(!buf.is_released(), total > 0);
                if released_seen {
                    prop_assert!(buf.is_released());
                }
                released_seen = buf.is_released();
            }
            prop_assert!(pool.stats().recycled <= 1);
            prop_assert_eq!(pool.stats().recycled == 1, buf.is_released());
        }
    }
}
