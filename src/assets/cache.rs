use std::collections::HashMap;

use crate::foundation::{digest::ContentDigest, error::PackResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Hit/miss counters of an [`AssetCache`].
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that ran the compute function (successfully or not).
    pub misses: u64,
}

/// Run-scoped memo of transformed assets keyed by the digest of their *input* bytes.
///
/// Entries are created lazily on the first miss and never replaced; the cache is dropped with the
/// pipeline run that owns it. There is no eviction.
#[derive(Debug)]
pub struct AssetCache<T> {
    entries: HashMap<ContentDigest, T>,
    stats: CacheStats,
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AssetCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Number of distinct digests stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl<T: Clone> AssetCache<T> {
    /// Return the cached value for `bytes`, or compute, store and return it.
    ///
    /// `compute` is not called on a hit. A failed compute leaves the cache unchanged.
    pub fn get_or_compute<F>(&mut self, bytes: &[u8], compute: F) -> PackResult<T>
    where
        F: FnOnce(&[u8]) -> PackResult<T>,
    {
        self.get_or_compute_digest(ContentDigest::of(bytes), bytes, compute)
    }

    /// Same as [`AssetCache::get_or_compute`] with a digest the caller already holds.
    pub fn get_or_compute_digest<F>(
        &mut self,
        digest: ContentDigest,
        bytes: &[u8],
        compute: F,
    ) -> PackResult<T>
    where
        F: FnOnce(&[u8]) -> PackResult<T>,
    {
        if let Some(hit) = self.entries.get(&digest) {
            self.stats.hits += 1;
            tracing::trace!(%digest, "asset cache hit");
            return Ok(hit.clone());
        }

        self.stats.misses += 1;
        let value = compute(bytes)?;
        self.entries.insert(digest, value.clone());
        Ok(value)
    }

    /// Record `value` for `digest` unless an entry already exists (first writer wins).
    ///
    /// Returns `true` when the value was inserted. Counts as a miss either way, since the value
    /// was computed outside the cache.
    pub fn insert_first(&mut self, digest: ContentDigest, value: T) -> bool {
        self.stats.misses += 1;
        if self.entries.contains_key(&digest) {
            return false;
        }
        self.entries.insert(digest, value);
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
