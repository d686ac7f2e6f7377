use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// A coalesced "something changed" notification: one registration list,
/// no payload. Listeners may be added and removed while a refresh cycle
/// is emitting; emission snapshots the list before invoking so a
/// listener can unsubscribe itself without deadlocking.
#[derive(Default)]
pub struct ChangeSignal {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl ChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(listener)));
        ListenerId(id)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|(listener_id, _)| *listener_id != id.0);
    }

    pub fn emit(&self) {
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}
