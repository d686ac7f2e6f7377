use std::sync::atomic::{AtomicI64, Ordering};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// 0 -> 1: the caller must perform the initial refresh and arm polling.
    First,
    Additional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    /// 1 -> 0: the caller must pause polling.
    Last,
    Remaining,
    /// Unmatched unsubscribe; the counter was already zero and is left there.
    Underflow,
}

/// Reference count of active UI observers for one device domain. Exactly
/// one caller observes each 0->1 and 1->0 transition, so polling is never
/// double-started or double-paused.
#[derive(Debug, Default)]
pub struct Subscribers {
    count: AtomicI64,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) -> SubscribeOutcome {
        if self.count.fetch_add(1, Ordering::SeqCst) == 0 {
            SubscribeOutcome::First
        } else {
            SubscribeOutcome::Additional
        }
    }

    pub fn remove(&self) -> UnsubscribeOutcome {
        loop {
            let current = self.count.load(Ordering::SeqCst);
            if current <= 0 {
                warn!("unsubscribe without matching subscribe, clamping at zero");
                return UnsubscribeOutcome::Underflow;
            }
            if self
                .count
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return if current == 1 {
                    UnsubscribeOutcome::Last
                } else {
                    UnsubscribeOutcome::Remaining
                };
            }
        }
    }

    pub fn active(&self) -> bool {
        self.count.load(Ordering::SeqCst) > 0
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }
}
