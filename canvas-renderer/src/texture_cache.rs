//! Bounded cache of decoded images.
//!
//! Entries are evicted least-recently-used first once either the byte or
//! the entry limit would be exceeded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::image::Texture;

#[derive(Debug)]
struct CacheEntry {
    texture: Arc<Texture>,
    last_accessed: Instant,
    size_bytes: usize,
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of evictions.
    pub evictions: u64,
    /// Total decoded bytes inserted.
    pub bytes_loaded: u64,
}

/// LRU cache of decoded textures keyed by image identifier.
#[derive(Debug)]
pub struct TextureCache {
    entries: HashMap<String, CacheEntry>,
    max_size_bytes: usize,
    max_entries: usize,
    current_size: usize,
    stats: CacheStats,
}

impl TextureCache {
    /// Create a cache with the given limits.
    #[must_use]
    pub fn new(max_size_bytes: usize, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_size_bytes,
            max_entries: max_entries.max(1),
            current_size: 0,
            stats: CacheStats::default(),
        }
    }

    /// Look up a texture, refreshing its recency.
    pub fn get(&mut self, key: &str) -> Option<Arc<Texture>> {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_accessed = Instant::now();
            self.stats.hits += 1;
            Some(Arc::clone(&entry.texture))
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Insert a texture, evicting older entries as needed.
    ///
    /// A texture larger than the byte limit is still cached on its own.
    pub fn insert(&mut self, key: String, texture: Arc<Texture>) {
        let size_bytes = texture.byte_len();

        if let Some(old) = self.entries.remove(&key) {
            self.current_size -= old.size_bytes;
        }

        while !self.entries.is_empty()
            && (self.current_size + size_bytes > self.max_size_bytes
                || self.entries.len() >= self.max_entries)
        {
            self.evict_lru();
        }

        self.current_size += size_bytes;
        self.stats.bytes_loaded += size_bytes as u64;
        self.entries.insert(
            key,
            CacheEntry {
                texture,
                last_accessed: Instant::now(),
                size_bytes,
            },
        );
    }

    /// Check if a texture is cached.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of cached textures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current cache size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.current_size
    }

    /// Cache statistics.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn evict_lru(&mut self) {
        let oldest_key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());

        if let Some(entry) = oldest_key.and_then(|key| self.entries.remove(&key)) {
            self.current_size -= entry.size_bytes;
            self.stats.evictions += 1;
        }
    }
}
