//! Explicit memoization with an optional time-to-live

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A map from argument to `(value, computed_at)`.
///
/// Entries older than `ttl` are recomputed on the next lookup. Without a TTL
/// an entry lives as long as the memo itself.
pub struct Memoized<K, V> {
    entries: Mutex<HashMap<K, (V, Instant)>>,
    ttl: Option<Duration>,
}

impl<K, V> Memoized<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    /// Return the memoized value for `key`, computing it with `compute` on a
    /// miss or when the stored value has expired.
    ///
    /// The lock is not held while `compute` runs, so two concurrent misses
    /// for the same key may both compute; the last one stored wins.
    pub fn get_or_insert_with<Q, F>(&self, key: &Q, compute: F) -> V
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce() -> V,
    {
        if let Ok(entries) = self.entries.lock()
            && let Some((value, computed_at)) = entries.get(key)
            && !self.is_expired(*computed_at)
        {
            return value.clone();
        }

        let value = compute();
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_owned(), (value.clone(), Instant::now()));
        }
        value
    }

    pub fn forget<Q>(&self, key: &Q)
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, computed_at: Instant) -> bool {
        self.ttl.is_some_and(|ttl| computed_at.elapsed() >= ttl)
    }
}

impl<K, V> Default for Memoized<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn computes_once_per_key_without_ttl() {
        let memo: Memoized<String, usize> = Memoized::new();
        let calls = Cell::new(0);

        for _ in 0..3 {
            let value = memo.get_or_insert_with("dude", || {
                calls.set(calls.get() + 1);
                4
            });
            assert_eq!(value, 4);
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn distinct_keys_are_computed_separately() {
        let memo: Memoized<String, String> = Memoized::new();

        assert_eq!(memo.get_or_insert_with("a", || "first".to_string()), "first");
        assert_eq!(memo.get_or_insert_with("b", || "second".to_string()), "second");
        assert_eq!(memo.get_or_insert_with("a", || "ignored".to_string()), "first");
    }

    #[test]
    fn expired_entries_are_recomputed() {
        let memo: Memoized<String, usize> = Memoized::with_ttl(Duration::from_millis(20));
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            calls.get()
        };

        assert_eq!(memo.get_or_insert_with("k", compute), 1);
        assert_eq!(memo.get_or_insert_with("k", compute), 1);

        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(memo.get_or_insert_with("k", compute), 2);
    }

    #[test]
    fn forget_drops_the_entry() {
        let memo: Memoized<String, usize> = Memoized::new();
        memo.get_or_insert_with("k", || 1);
        memo.forget("k");

        assert!(memo.is_empty());
        assert_eq!(memo.get_or_insert_with("k", || 2), 2);
    }
}
