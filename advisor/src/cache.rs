//! Bounded cache for layer suggestions, keyed by image content.
use std::num::NonZeroUsize;

use lru::LruCache;
use ml::LayerSpec;

use crate::ContentHash;

/// LRU cache from image content to suggested layers.
///
/// Reads refresh the recency of an entry; inserting into a full cache evicts the
/// least recently used one.
pub struct SuggestionCache {
    cache: LruCache<ContentHash, Vec<LayerSpec>>,
    hits: u64,
    misses: u64,
}

impl SuggestionCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Returns a copy of the cached layers, if present.
    pub fn get(&mut self, key: &ContentHash) -> Option<Vec<LayerSpec>> {
        match self.cache.get(key) {
            Some(layers) => {
                self.hits += 1;
                Some(layers.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, key: ContentHash, layers: Vec<LayerSpec>) {
        self.cache.put(key, layers);
    }

    pub fn contains(&self, key: &ContentHash) -> bool {
        self.cache.contains(key)
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// hits / (hits + misses), 0 before the first lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> SuggestionCache {
        SuggestionCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn key(n: u8) -> ContentHash {
        ContentHash::of(&[n])
    }

    #[test]
    fn test_hits_and_misses() {
        let mut cache = cache(2);
        assert_eq!(cache.get(&key(0)), None);

        let layers = vec![LayerSpec::new("relu")];
        cache.put(key(0), layers.clone());
        assert_eq!(cache.get(&key(0)), Some(layers));

        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert!((cache.hit_rate() - 0.5).abs() < 1e-12);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hit_rate(), 0.0);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let mut cache = cache(2);
        cache.put(key(0), vec![LayerSpec::new("relu")]);
        cache.put(key(1), vec![LayerSpec::new("maxpool")]);
        // touching 0 makes 1 the eviction candidate
        assert!(cache.get(&key(0)).is_some());
        cache.put(key(2), vec![LayerSpec::new("avgpool")]);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);
        assert!(cache.contains(&key(0)));
        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(2)));
    }
}
