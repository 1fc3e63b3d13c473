//! Named signal table owned by a property bag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Opaque payload handed to listeners. `fire` never interprets it.
#[derive(Debug, Clone)]
pub enum EventPayload {
    PropertyChanged(String),
    FrameShow(i64),
    Message(String),
}

type Callback = Arc<dyn Fn(&EventPayload) + Send + Sync>;

struct Listener {
    owner: u64,
    callback: Callback,
}

/// Per-bag table of named signals. Listener lists are copied on fire so a
/// callback may disconnect itself or another listener without racing the
/// dispatch loop.
pub struct EventBus {
    table: RwLock<HashMap<String, Vec<Listener>>>,
    block_depth: AtomicU32,
    next_owner: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            block_depth: AtomicU32::new(0),
            next_owner: AtomicU64::new(1),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh owner key for a future `listen`/`disconnect` pair.
    pub fn new_owner(&self) -> u64 {
        self.next_owner.fetch_add(1, Ordering::Relaxed)
    }

    pub fn listen(
        &self,
        name: &str,
        owner: u64,
        callback: impl Fn(&EventPayload) + Send + Sync + 'static,
    ) {
        self.table
            .write()
            .entry(name.to_string())
            .or_default()
            .push(Listener {
                owner,
                callback: Arc::new(callback),
            });
    }

    pub fn disconnect(&self, owner: u64) {
        let mut table = self.table.write();
        for listeners in table.values_mut() {
            listeners.retain(|l| l.owner != owner);
        }
    }

    pub fn fire(&self, name: &str, payload: EventPayload) {
        if self.block_depth.load(Ordering::Acquire) > 0 {
            return;
        }
        let snapshot: Vec<Callback> = {
            let table = self.table.read();
            match table.get(name) {
                Some(listeners) => listeners.iter().map(|l| l.callback.clone()).collect(),
                None => return,
            }
        };
        for cb in snapshot {
            cb(&payload);
        }
    }

    pub fn block(&self) {
        self.block_depth.fetch_add(1, Ordering::AcqRel);
    }

    pub fn unblock(&self) {
        self.block_depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| {
                Some(d.saturating_sub(1))
            })
            .ok();
    }

    pub fn is_blocked(&self) -> bool {
        self.block_depth.load(Ordering::Acquire) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn fire_invokes_listeners_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        bus.listen("x", bus.new_owner(), move |_| o1.lock().push(1));
        bus.listen("x", bus.new_owner(), move |_| o2.lock().push(2));
        bus.fire("x", EventPayload::Message("go".into()));
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn block_drops_fires_without_queueing() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bus.listen("x", bus.new_owner(), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.block();
        bus.fire("x", EventPayload::Message("ignored".into()));
        bus.unblock();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        bus.fire("x", EventPayload::Message("seen".into()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disconnect_removes_only_that_owner() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let owner1 = bus.new_owner();
        let owner2 = bus.new_owner();
        bus.listen("x", owner1, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.listen("x", owner2, |_| {});
        bus.disconnect(owner1);
        bus.fire("x", EventPayload::Message("go".into()));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
