//! Byte-bounded LRU storage for cached tool output.

use bytes::Bytes;
use lru::LruCache;

/// LRU map whose capacity is a byte budget rather than an entry count.
///
/// An entry costs its key length plus its value length. Inserting past the
/// budget evicts least-recently-used entries until the total fits again.
#[derive(Debug)]
pub(crate) struct ByteLru {
    entries: LruCache<String, Bytes>,
    capacity: usize,
    bytes: usize,
}

fn cost(key: &str, value: &Bytes) -> usize {
    key.len() + value.len()
}

impl ByteLru {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity,
            bytes: 0,
        }
    }

    /// Look up `key`, marking it most recently used.
    pub(crate) fn get(&mut self, key: &str) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    /// Look up `key` without touching recency.
    pub(crate) fn peek(&self, key: &str) -> Option<Bytes> {
        self.entries.peek(key).cloned()
    }

    /// Store `value`, returning how many entries were evicted to make room.
    /// A value larger than the whole budget is not stored.
    pub(crate) fn insert(&mut self, key: String, value: Bytes) -> usize {
        let size = cost(&key, &value);
        if size > self.capacity {
            return 0;
        }
        if let Some(old) = self.entries.put(key.clone(), value) {
            self.bytes -= cost(&key, &old);
        }
        self.bytes += size;
        let mut evicted = 0;
        while self.bytes > self.capacity {
            let Some((k, v)) = self.entries.pop_lru() else {
                break;
            };
            self.bytes -= cost(&k, &v);
            evicted += 1;
        }
        evicted
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.bytes = 0;
    }

    pub(crate) const fn bytes(&self) -> usize {
        self.bytes
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
