use std::collections::HashMap;
use std::hash::Hash;

/// Number of content characters that participate in a cache key. A prefix,
/// not a hash: two long inputs sharing the first `FINGERPRINT_PREFIX_CHARS`
/// characters collide. Accepted trade-off to bound key size.
pub const FINGERPRINT_PREFIX_CHARS: usize = 120;

/// Cache key for content-based entries: scan kind plus a bounded prefix of
/// the content.
pub fn content_fingerprint(kind: &str, content: &str) -> String {
  let prefix: String = content.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
  format!("{kind}:{prefix}")
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
  value: V,
  inserted_at_unix_ms: u64,
  ttl_ms: u64,
}

/// A lookup hit; the presence of this wrapper is the "came from cache"
/// annotation callers use to suppress duplicate side effects.
#[derive(Debug, Clone)]
pub struct Hit<V> {
  pub value: V,
  pub age_ms: u64,
}

/// Time-boxed map. Expiry makes an entry invisible to `lookup` immediately,
/// but memory is only reclaimed by the periodic `sweep`, so the map stays
/// bounded even with no read traffic.
#[derive(Debug)]
pub struct TtlCache<K, V> {
  entries: HashMap<K, CacheEntry<V>>,
  default_ttl_ms: u64,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
  pub fn new(default_ttl_ms: u64) -> Self {
    Self {
      entries: HashMap::new(),
      default_ttl_ms,
    }
  }

  pub fn lookup(&self, key: &K, now_unix_ms: u64) -> Option<Hit<V>> {
    let entry = self.entries.get(key)?;
    let age_ms = now_unix_ms.saturating_sub(entry.inserted_at_unix_ms);
    if age_ms > entry.ttl_ms {
      return None;
    }
    Some(Hit {
      value: entry.value.clone(),
      age_ms,
    })
  }

  pub fn store(&mut self, key: K, value: V, now_unix_ms: u64) {
    let ttl = self.default_ttl_ms;
    self.store_with_ttl(key, value, ttl, now_unix_ms);
  }

  pub fn store_with_ttl(&mut self, key: K, value: V, ttl_ms: u64, now_unix_ms: u64) {
    self.entries.insert(
      key,
      CacheEntry {
        value,
        inserted_at_unix_ms: now_unix_ms,
        ttl_ms,
      },
    );
  }

  /// Removes expired entries; returns how many were dropped. Never fails.
  pub fn sweep(&mut self, now_unix_ms: u64) -> usize {
    let before = self.entries.len();
    self
      .entries
      .retain(|_, e| now_unix_ms.saturating_sub(e.inserted_at_unix_ms) <= e.ttl_ms);
    before - self.entries.len()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
