//! Per-fingerprint coordination of concurrent identical requests.
//!
//! The first request for a key becomes the owner and computes; later ones
//! wait on a watch channel for the owner's outcome. If the owner goes away
//! without publishing, its waiters see the channel close and race to take
//! over. Keys never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

struct Slot<T> {
    id: u64,
    rx: watch::Receiver<Option<T>>,
}

type Slots<T> = Arc<Mutex<HashMap<String, Slot<T>>>>;

pub struct InFlight<T> {
    slots: Slots<T>,
    next_id: AtomicU64,
}

pub enum Role<T> {
    Owner(OwnerGuard<T>),
    Waiter(Waiter<T>),
}

impl<T: Clone> InFlight<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Become the owner of `key`, or a waiter on the current owner.
    pub fn join(&self, key: &str) -> Role<T> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            // A closed channel is a dead owner whose guard has not run yet.
            if slot.rx.has_changed().is_ok() {
                return Role::Waiter(Waiter {
                    rx: slot.rx.clone(),
                });
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        slots.insert(key.to_string(), Slot { id, rx });
        Role::Owner(OwnerGuard {
            slots: Arc::clone(&self.slots),
            key: key.to_string(),
            id,
            tx,
        })
    }

    /// Keys with a live owner.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for InFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the computing request. Dropping it releases the key.
pub struct OwnerGuard<T> {
    slots: Slots<T>,
    key: String,
    id: u64,
    tx: watch::Sender<Option<T>>,
}

impl<T> OwnerGuard<T> {
    /// Hand `value` to every current and future waiter on this key.
    pub fn publish(&self, value: T) {
        self.tx.send_replace(Some(value));
    }
}

impl<T> Drop for OwnerGuard<T> {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        if slots.get(&self.key).is_some_and(|slot| slot.id == self.id) {
            slots.remove(&self.key);
        }
    }
}

pub struct Waiter<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Waiter<T> {
    /// The owner's outcome, or `None` if it vanished without publishing.
    pub async fn wait(mut self) -> Option<T> {
        loop {
            let current = self.rx.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(role: Role<u32>) -> OwnerGuard<u32> {
        match role {
            Role::Owner(guard) => guard,
            Role::Waiter(_) => panic!("expected owner"),
        }
    }

    fn waiter(role: Role<u32>) -> Waiter<u32> {
        match role {
            Role::Waiter(w) => w,
            Role::Owner(_) => panic!("expected waiter"),
        }
    }

    #[tokio::test]
    async fn waiters_receive_the_owners_value() {
        let inflight = InFlight::new();
        let guard = owner(inflight.join("k"));
        let first = waiter(inflight.join("k"));
        let second = waiter(inflight.join("k"));

        let handle = tokio::spawn(first.wait());
        guard.publish(42);
        assert_eq!(handle.await.unwrap(), Some(42));
        assert_eq!(second.wait().await, Some(42));
    }

    #[tokio::test]
    async fn dropped_owner_lets_a_waiter_take_over() {
        let inflight = InFlight::new();
        let guard = owner(inflight.join("k"));
        let w = waiter(inflight.join("k"));
        drop(guard);

        assert_eq!(w.wait().await, None);
        assert!(inflight.is_empty());
        let _next = owner(inflight.join("k"));
        assert_eq!(inflight.len(), 1);
    }

    #[test]
    fn keys_are_independent() {
        let inflight = InFlight::<u32>::new();
        let _a = owner(inflight.join("a"));
        let _b = owner(inflight.join("b"));
        assert_eq!(inflight.len(), 2);
    }

    #[test]
    fn stale_guard_does_not_evict_a_newer_owner() {
        let inflight = InFlight::<u32>::new();
        let old = owner(inflight.join("k"));
        // The slot now belongs to a newer owner.
        inflight.slots.lock().get_mut("k").unwrap().id = u64::MAX;
        drop(old);
        assert_eq!(inflight.len(), 1);
    }
}
