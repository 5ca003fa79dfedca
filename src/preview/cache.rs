//! LRU cache for finished raster bitmaps

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::request::RasterParams;
use super::types::Bitmap;

/// Cache key for rendered bitmaps
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Session revision the bitmap was rendered from
    pub revision: u64,
    /// Device pixels per point (stored as millionths for stable hashing)
    pub density_millionths: u64,
    /// Page color as 0xRRGGBB
    pub page_color: u32,
}

impl CacheKey {
    /// Create a cache key from raster parameters
    #[must_use]
    pub fn from_params(revision: u64, params: &RasterParams) -> Self {
        Self {
            revision,
            density_millionths: (f64::from(params.density()) * 1_000_000.0).round() as u64,
            page_color: params.page_color.to_u32(),
        }
    }
}

/// LRU cache for rendered bitmaps
pub struct BitmapCache {
    cache: LruCache<CacheKey, Arc<Bitmap>>,
}

impl BitmapCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached bitmap, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Bitmap>> {
        self.cache.get(key).cloned()
    }

    /// Check if a key is in the cache without promoting it
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    pub fn insert(&mut self, key: CacheKey, bitmap: Arc<Bitmap>) {
        self.cache.put(key, bitmap);
    }

    /// Drop bitmaps rendered from revisions older than `revision`
    pub fn retain_revision(&mut self, revision: u64) {
        let stale: Vec<_> = self
            .cache
            .iter()
            .filter(|(k, _)| k.revision != revision)
            .map(|(k, _)| *k)
            .collect();

        for key in stale {
            self.cache.pop(&key);
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
