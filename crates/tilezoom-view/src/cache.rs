//! In-memory LRU cache of decoded tiles.
//!
//! Entries hold a cache-class reference on their [`RefCountedBuffer`], so a
//! cached tile survives being scrolled off screen and is picked up again
//! without decoding. Eviction only drops the cache reference; pixels that
//! are still displayed or installed stay alive until those owners let go.

use std::collections::HashMap;
use std::sync::Arc;

use tilezoom_decode::RefCountedBuffer;
use tracing::trace;

use crate::planner::TileSpec;

const OWNER: &str = "tile-cache";

/// LRU node for cache management.
#[derive(Debug, Clone, Copy, Default)]
struct LruNode {
    prev: Option<TileSpec>,
    next: Option<TileSpec>,
}

struct Entry {
    buffer: Arc<RefCountedBuffer>,
    bytes: usize,
    node: LruNode,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a buffer.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries dropped to stay under the byte limit.
    pub evictions: u64,
    /// Entries currently cached.
    pub entries: usize,
    /// Bytes currently cached.
    pub bytes: usize,
}

impl CacheStats {
    /// Hit rate as percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Byte-limited LRU cache keyed by [`TileSpec`].
pub struct TileCache {
    max_bytes: usize,
    entries: HashMap<TileSpec, Entry>,
    /// Most recently used.
    head: Option<TileSpec>,
    /// Least recently used.
    tail: Option<TileSpec>,
    stats: CacheStats,
}

impl TileCache {
    /// Creates a cache holding at most `max_bytes` of pixels. Zero disables it.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            entries: HashMap::new(),
            head: None,
            tail: None,
            stats: CacheStats::default(),
        }
    }

    /// Byte limit.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Number of cached tiles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `spec` is cached. Does not touch recency.
    pub fn contains(&self, spec: &TileSpec) -> bool {
        self.entries.contains_key(spec)
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Looks up a tile and marks it most recently used.
    ///
    /// The returned buffer is kept alive by the cache only; callers that
    /// keep it must add their own reference.
    pub fn get(&mut self, spec: &TileSpec) -> Option<Arc<RefCountedBuffer>> {
        let buffer = match self.entries.get(spec) {
            Some(entry) => Arc::clone(&entry.buffer),
            None => {
                self.stats.misses += 1;
                return None;
            }
        };
        if buffer.is_released() {
            self.remove(spec);
            self.stats.misses += 1;
            return None;
        }
        self.stats.hits += 1;
        self.touch(spec);
        Some(buffer)
    }

    /// Caches `buffer` under `spec`, evicting older tiles as needed.
    ///
    /// Buffers larger than the whole cache are not cached.
    pub fn put(&mut self, spec: TileSpec, buffer: &Arc<RefCountedBuffer>) {
        if self.entries.contains_key(&spec) {
            self.touch(&spec);
            return;
        }
        let bytes = buffer.spec().byte_len();
        if bytes == 0 || bytes > self.max_bytes || buffer.is_released() {
            return;
        }
        buffer.set_cached(OWNER, true);
        self.entries.insert(
            spec,
            Entry {
                buffer: Arc::clone(buffer),
                bytes,
                node: LruNode::default(),
            },
        );
        self.link_front(spec);
        self.stats.bytes += bytes;
        self.stats.entries = self.entries.len();
        trace!(tile = %spec, bytes, total = self.stats.bytes, "cached tile");

        while self.stats.bytes > self.max_bytes {
            let Some(victim) = self.tail else { break };
            self.remove(&victim);
            self.stats.evictions += 1;
            trace!(tile = %victim, "evicted tile");
        }
    }

    /// Drops one tile. Returns `false` if it was not cached.
    pub fn remove(&mut self, spec: &TileSpec) -> bool {
        if !self.entries.contains_key(spec) {
            return false;
        }
        self.unlink(spec);
        let Some(entry) = self.entries.remove(spec) else {
            return false;
        };
        entry.buffer.set_cached(OWNER, false);
        self.stats.bytes = self.stats.bytes.saturating_sub(entry.bytes);
        self.stats.entries = self.entries.len();
        true
    }

    /// Drops every tile.
    pub fn clear(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.buffer.set_cached(OWNER, false);
        }
        self.head = None;
        self.tail = None;
        self.stats.bytes = 0;
        self.stats.entries = 0;
    }

    /// Moves key to front of LRU list.
    fn touch(&mut self, spec: &TileSpec) {
        if self.head == Some(*spec) {
            return;
        }
        self.unlink(spec);
        self.link_front(*spec);
    }

    /// Adds a key to front of LRU list.
    fn link_front(&mut self, spec: TileSpec) {
        let old_head = self.head;
        if let Some(entry) = self.entries.get_mut(&spec) {
            entry.node = LruNode {
                prev: None,
                next: old_head,
            };
        }
        if let Some(old) = old_head.and_then(|h| self.entries.get_mut(&h)) {
            old.node.prev = Some(spec);
        }
        self.head = Some(spec);
        if self.tail.is_none() {
            self.tail = Some(spec);
        }
    }

    /// Removes key from LRU list.
    fn unlink(&mut self, spec: &TileSpec) {
        let Some(node) = self.entries.get(spec).map(|e| e.node) else {
            return;
        };
        match node.prev {
            Some(prev) => {
                if let Some(p) = self.entries.get_mut(&prev) {
                    p.node.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(n) = self.entries.get_mut(&next) {
                    n.node.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        if let Some(entry) = self.entries.get_mut(spec) {
            entry.node = LruNode::default();
        }
    }
}

impl Drop for TileCache {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("max_bytes", &self.max_bytes)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilezoom_core::{BufferSpec, PixelBuffer, PixelFormat, Rect};
    use tilezoom_decode::{FreshAllocator, RefClass};

    fn tile(x: u32) -> TileSpec {
        TileSpec {
            rect: Rect::new(x, 0, 4, 4),
            sample_size: 1,
        }
    }

    // 4x4 RGBA = 64 bytes
    fn buffer() -> Arc<RefCountedBuffer> {
        Arc::new(RefCountedBuffer::new(
            "b",
            PixelBuffer::new(BufferSpec::new(4, 4, PixelFormat::Rgba8)),
            Arc::new(FreshAllocator),
            RefClass::Pending,
        ))
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = TileCache::new(128);
        let (a, b, c) = (buffer(), buffer(), buffer());
        cache.put(tile(0), &a);
        cache.put(tile(4), &b);
        assert!(cache.get(&tile(0)).is_some());
        cache.put(tile(8), &c);

        assert!(cache.contains(&tile(0)));
        assert!(!cache.contains(&tile(4)));
        assert!(cache.contains(&tile(8)));
        let stats = cache.stats();
        assert_eq!((stats.entries, stats.bytes, stats.evictions), (2, 128, 1));
        assert_eq!(b.counts().cache, 0);
        assert_eq!(a.counts().cache, 1);
    }

    #[test]
    fn eviction_releases_unreferenced_buffers() {
        let mut cache = TileCache::new(64);
        let a = buffer();
        cache.put(tile(0), &a);
        a.set_pending("test", false);
        assert!(!a.is_released());

        cache.put(tile(4), &buffer());
        assert!(a.is_released());
    }

    #[test]
    fn hit_rate_and_clear() {
        let mut cache = TileCache::new(1024);
        let a = buffer();
        cache.put(tile(0), &a);
        cache.put(tile(0), &a);
        assert_eq!(a.counts().cache, 1);
        assert!(cache.get(&tile(0)).is_some());
        assert!(cache.get(&tile(4)).is_none());
        assert!((cache.stats().hit_rate() - 50.0).abs() < 1e-9);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(a.counts().cache, 0);
        assert_eq!(cache.stats().bytes, 0);
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let mut cache = TileCache::new(0);
        cache.put(tile(0), &buffer());
        assert!(cache.is_empty());
    }

    #[test]
    fn lru_links_stay_consistent() {
        let mut cache = TileCache::new(64 * 3);
        let buffers: Vec<_> = (0..3).map(|_| buffer()).collect();
        for (i, b) in buffers.iter().enumerate() {
            cache.put(tile(i as u32 * 4), b);
        }
        assert!(cache.remove(&tile(4)));
        assert!(cache.get(&tile(0)).is_some());
        // Tail is now tile(8); the next insert evicts it.
        cache.put(tile(12), &buffer());
        cache.put(tile(16), &buffer());
        assert!(!cache.contains(&tile(8)));
        assert!(cache.contains(&tile(0)));
    }
}
