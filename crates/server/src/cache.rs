//! Keyed async cache. Concurrent requests for the same key share one fetch.

use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{Mutex, MutexGuard},
};

use futures_util::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use tracing::trace;

type PendingFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

enum Slot<V, E> {
    Ready(V),
    Pending(PendingFetch<V, E>),
}

struct Entry<V, E> {
    slot: Slot<V, E>,
    last_used: u64,
}

struct Inner<K, V, E> {
    entries: HashMap<K, Entry<V, E>>,
    clock: u64,
}

impl<K: Eq + Hash, V, E> Inner<K, V, E> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Size bounded, least recently used cache of fetched values.
///
/// Successful fetches are kept, failed ones are forgotten so the next caller retries.
/// Cheap to share behind an `Arc`, one instance per process or per test.
pub struct AsyncCache<K, V, E> {
    inner: Mutex<Inner<K, V, E>>,
    capacity: usize,
}

impl<K, V, E> AsyncCache<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V, E>> {
        // A panic while holding the lock leaves the map consistent, keep using it
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let now = inner.tick();
        let entry = inner.entries.get_mut(key)?;
        match &entry.slot {
            Slot::Ready(value) => {
                entry.last_used = now;
                Some(value.clone())
            }
            Slot::Pending(_) => None,
        }
    }

    /// Stores `value`, replacing whatever the key held.
    pub fn set(&self, key: K, value: V) {
        let mut inner = self.lock();
        let now = inner.tick();
        inner.entries.insert(
            key,
            Entry {
                slot: Slot::Ready(value),
                last_used: now,
            },
        );
        self.evict(&mut inner);
    }

    /// Returns the cached value or runs `producer` to get it.
    ///
    /// While a fetch for `key` is in flight every other caller awaits that same fetch
    /// instead of starting its own.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let pending = {
            let mut inner = self.lock();
            let now = inner.tick();
            match inner.entries.get_mut(&key) {
                Some(Entry {
                    slot: Slot::Ready(value),
                    last_used,
                }) => {
                    *last_used = now;
                    return Ok(value.clone());
                }
                Some(Entry {
                    slot: Slot::Pending(pending),
                    ..
                }) => {
                    trace!("Joining in-flight fetch");
                    pending.clone()
                }
                None => {
                    let pending = producer().boxed().shared();
                    inner.entries.insert(
                        key.clone(),
                        Entry {
                            slot: Slot::Pending(pending.clone()),
                            last_used: now,
                        },
                    );
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut inner = self.lock();
        let still_pending = matches!(
            inner.entries.get(&key),
            Some(Entry { slot: Slot::Pending(current), .. }) if current.ptr_eq(&pending)
        );
        if still_pending {
            match &result {
                Ok(value) => {
                    let now = inner.tick();
                    inner.entries.insert(
                        key,
                        Entry {
                            slot: Slot::Ready(value.clone()),
                            last_used: now,
                        },
                    );
                    self.evict(&mut inner);
                }
                Err(_) => {
                    inner.entries.remove(&key);
                }
            }
        }
        result
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        match self.lock().entries.remove(key)?.slot {
            Slot::Ready(value) => Some(value),
            Slot::Pending(_) => None,
        }
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Drops every entry whose key is not in `keys`.
    pub fn clear_except(&self, keys: &[K]) {
        self.lock().entries.retain(|key, _| keys.contains(key));
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Evicts the least recently used ready values until the cache fits. In-flight
    /// fetches are never evicted.
    fn evict(&self, inner: &mut Inner<K, V, E>) {
        while inner.entries.len() > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .filter(|(_, entry)| matches!(entry.slot, Slot::Ready(_)))
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    inner.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[tokio::test]
async fn concurrent_fetches_share_one_request() {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    let cache: AsyncCache<String, u32, String> = AsyncCache::new(8);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch = || {
        let calls = calls.clone();
        cache.get_or_fetch("route".to_string(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(7)
        })
    };
    let (a, b) = tokio::join!(fetch(), fetch());
    assert_eq!(a, Ok(7));
    assert_eq!(b, Ok(7));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get(&"route".to_string()), Some(7));
}

#[tokio::test]
async fn failures_are_not_memoised() {
    let cache: AsyncCache<&'static str, u32, String> = AsyncCache::new(8);
    let failed = cache
        .get_or_fetch("key", || async { Err("offline".to_string()) })
        .await;
    assert_eq!(failed, Err("offline".to_string()));
    assert_eq!(cache.len(), 0);
    let fetched = cache.get_or_fetch("key", || async { Ok(3) }).await;
    assert_eq!(fetched, Ok(3));
}

#[test]
fn least_recently_used_is_evicted() {
    let cache: AsyncCache<u32, u32, ()> = AsyncCache::new(2);
    cache.set(1, 10);
    cache.set(2, 20);
    assert_eq!(cache.get(&1), Some(10));
    cache.set(3, 30);
    assert_eq!(cache.get(&2), None);
    assert_eq!(cache.get(&1), Some(10));
    assert_eq!(cache.get(&3), Some(30));
}

#[test]
fn clear_except_keeps_listed_keys() {
    let cache: AsyncCache<u32, u32, ()> = AsyncCache::new(8);
    (0..5).for_each(|i| cache.set(i, i));
    cache.clear_except(&[1, 3]);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&3), Some(3));
    cache.clear();
    assert_eq!(cache.len(), 0);
}
