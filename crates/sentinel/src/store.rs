//! In-memory session table with per-session locking and idle eviction.
//!
//! The table lock only guards slot lookup/insertion. All mutation of a
//! session happens through its own async mutex, so work on one session never
//! blocks another, and two messages for the same session are serialized.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

struct Slot<T> {
    value: T,
    last_touched: Instant,
}

type SlotHandle<T> = Arc<Mutex<Slot<T>>>;

/// Keyed session table
pub struct SessionStore<T> {
    sessions: RwLock<HashMap<String, SlotHandle<T>>>,
}

/// Exclusive access to one session. Held across vision calls so a session
/// never has more than one in-flight mutation.
pub struct SessionGuard<T> {
    guard: OwnedMutexGuard<Slot<T>>,
}

impl<T> Deref for SessionGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard.value
    }
}

impl<T> DerefMut for SessionGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard.value
    }
}

impl<T> Default for SessionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SessionStore<T> {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn slot(value: T) -> SlotHandle<T> {
        Arc::new(Mutex::new(Slot {
            value,
            last_touched: Instant::now(),
        }))
    }

    async fn acquire(handle: SlotHandle<T>) -> SessionGuard<T> {
        let mut guard = handle.lock_owned().await;
        guard.last_touched = Instant::now();
        SessionGuard { guard }
    }

    /// Install `value` under `id` and return it locked, along with the value
    /// it replaced. An existing session is swapped in place under its own
    /// lock, so in-flight work on the old value finishes first and nothing
    /// else sees the new value until the guard is dropped.
    pub async fn replace(&self, id: &str, value: T) -> (SessionGuard<T>, Option<T>) {
        let existing = self.sessions.read().await.get(id).cloned();
        let handle = match existing {
            Some(handle) => handle,
            None => {
                let mut sessions = self.sessions.write().await;
                if let Some(handle) = sessions.get(id).cloned() {
                    handle
                } else {
                    let handle = Self::slot(value);
                    sessions.insert(id.to_string(), handle.clone());
                    drop(sessions);
                    return (Self::acquire(handle).await, None);
                }
            }
        };

        let mut guard = Self::acquire(handle).await;
        let old = std::mem::replace(&mut *guard, value);
        (guard, Some(old))
    }

    /// Lock an existing session
    pub async fn lock(&self, id: &str) -> Option<SessionGuard<T>> {
        let handle = self.sessions.read().await.get(id).cloned()?;
        Some(Self::acquire(handle).await)
    }

    /// Lock a session, creating it first if absent
    pub async fn lock_or_insert_with(&self, id: &str, init: impl FnOnce() -> T) -> SessionGuard<T> {
        let existing = self.sessions.read().await.get(id).cloned();
        let handle = match existing {
            Some(handle) => handle,
            None => {
                let mut sessions = self.sessions.write().await;
                sessions
                    .entry(id.to_string())
                    .or_insert_with(|| Self::slot(init()))
                    .clone()
            }
        };
        Self::acquire(handle).await
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove sessions idle for longer than `ttl`.
    ///
    /// Sessions that are locked or whose handle is held elsewhere are
    /// skipped. `on_evict` sees each value before it is dropped.
    pub async fn evict_idle(&self, ttl: Duration, mut on_evict: impl FnMut(&str, &T)) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();

        for (id, handle) in sessions.iter() {
            if Arc::strong_count(handle) > 1 {
                continue;
            }
            let Ok(slot) = handle.try_lock() else {
                continue;
            };
            if slot.last_touched.elapsed() > ttl {
                on_evict(id, &slot.value);
                expired.push(id.clone());
            }
        }

        for id in &expired {
            sessions.remove(id);
        }

        expired.len()
    }

    /// Read a session without counting as activity for idle eviction
    pub async fn read<R>(&self, id: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        let handle = self.sessions.read().await.get(id).cloned()?;
        let slot = handle.lock().await;
        Some(f(&slot.value))
    }
}

impl<T: Clone> SessionStore<T> {
    /// Clone of a session's current value
    pub async fn snapshot(&self, id: &str) -> Option<T> {
        self.read(id, T::clone).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_and_lock() {
        let store = SessionStore::new();
        let (guard, old) = store.replace("a", 1u32).await;
        drop(guard);
        assert_eq!(old, None);
        let (guard, old) = store.replace("a", 2u32).await;
        drop(guard);
        assert_eq!(old, Some(1));

        {
            let mut guard = store.lock("a").await.unwrap();
            *guard += 10;
        }
        assert_eq!(store.snapshot("a").await, Some(12));
        assert!(store.lock("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_lock_or_insert_creates_once() {
        let store = SessionStore::new();
        {
            let mut guard = store.lock_or_insert_with("s", || 0u32).await;
            *guard += 1;
        }
        {
            let mut guard = store.lock_or_insert_with("s", || 100u32).await;
            *guard += 1;
        }
        assert_eq!(store.snapshot("s").await, Some(2));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_same_session_is_serialized() {
        let store = Arc::new(SessionStore::new());
        store.replace("s", 0u32).await;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut guard = store.lock("s").await.unwrap();
                let current = *guard;
                tokio::task::yield_now().await;
                *guard = current + 1;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.snapshot("s").await, Some(32));
    }

    #[tokio::test]
    async fn test_evict_idle() {
        let store = SessionStore::new();
        store.replace("old", 1u32).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        store.replace("fresh", 2u32).await;

        let mut evicted = Vec::new();
        let count = store
            .evict_idle(Duration::from_millis(20), |id, v| evicted.push((id.to_string(), *v)))
            .await;

        assert_eq!(count, 1);
        assert_eq!(evicted, vec![("old".to_string(), 1)]);
        assert_eq!(store.snapshot("old").await, None);
        assert_eq!(store.snapshot("fresh").await, Some(2));
    }

    #[tokio::test]
    async fn test_evict_skips_locked_sessions() {
        let store = SessionStore::new();
        store.replace("busy", 1u32).await;
        let guard = store.lock("busy").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let count = store.evict_idle(Duration::from_millis(1), |_, _| {}).await;
        assert_eq!(count, 0);
        drop(guard);

        let count = store.evict_idle(Duration::from_millis(1), |_, _| {}).await;
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_replace_waits_for_in_flight_work() {
        let store = Arc::new(SessionStore::new());
        store.replace("s", 1u32).await;

        let mut guard = store.lock("s").await.unwrap();
        let replacer = {
            let store = store.clone();
            tokio::spawn(async move {
                let (guard, old) = store.replace("s", 100u32).await;
                (*guard, old)
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        *guard = 7;
        drop(guard);

        assert_eq!(replacer.await.unwrap(), (100, Some(7)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_reads_do_not_keep_session_alive() {
        let store = SessionStore::new();
        store.replace("s", 1u32).await;

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(store.snapshot("s").await, Some(1));
            assert_eq!(store.read("s", |v| *v + 1).await, Some(2));
        }

        let count = store.evict_idle(Duration::from_millis(15), |_, _| {}).await;
        assert_eq!(count, 1);
    }
}
