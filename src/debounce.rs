use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

type Action = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Scheduler states. Transitions:
///
/// - `ping` moves any live state to `Armed` (a fresh quiet period).
/// - `pause` moves any live state to `Paused`.
/// - Quiet-period expiry moves `Armed` to `Running` for the duration of
///   the action, then back to `Armed` unless a `pause` or disposal
///   happened while the action ran.
/// - Disposal is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Armed { deadline: Instant },
    Running,
    Paused,
    Disposed,
}

struct Shared {
    state: Mutex<State>,
    wake: Notify,
}

/// Invokes an async action once per quiet period. `ping` restarts the
/// countdown (and un-pauses), `pause` stops firing until the next ping.
/// After the action completes the countdown restarts by itself, so the
/// effective cadence is "quiet period after the action finishes" and
/// invocations never overlap.
///
/// Must be created inside a Tokio runtime; the countdown runs on a
/// spawned worker task that exits on disposal.
pub struct Debouncer {
    shared: Arc<Shared>,
    quiet_period: Duration,
    worker: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new<F, Fut>(quiet_period: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action: Action = Arc::new(move || Box::pin(action()));
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Idle),
            wake: Notify::new(),
        });

        let worker = tokio::spawn(Self::run(shared.clone(), quiet_period, action));

        Self {
            shared,
            quiet_period,
            worker: Some(worker),
        }
    }

    async fn run(shared: Arc<Shared>, quiet_period: Duration, action: Action) {
        loop {
            let deadline = {
                match *shared.state.lock().unwrap() {
                    State::Disposed => break,
                    State::Armed { deadline } => Some(deadline),
                    State::Idle | State::Paused | State::Running => None,
                }
            };

            let Some(deadline) = deadline else {
                shared.wake.notified().await;
                continue;
            };

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = shared.wake.notified() => continue,
            }

            // Claim the firing under the lock: a ping may have pushed the
            // deadline out, a pause may have disarmed us.
            let fire = {
                let mut state = shared.state.lock().unwrap();
                match *state {
                    State::Armed { deadline } if deadline <= Instant::now() => {
                        *state = State::Running;
                        true
                    }
                    _ => false,
                }
            };
            if !fire {
                continue;
            }

            trace!("quiet period expired, running action");
            action().await;

            let mut state = shared.state.lock().unwrap();
            if *state == State::Running {
                *state = State::Armed {
                    deadline: Instant::now() + quiet_period,
                };
            }
        }
    }

    /// Restart the quiet-period countdown. Clears a paused state; delays
    /// (but never cancels) an in-flight action's next firing.
    pub fn ping(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if *state == State::Disposed {
            return;
        }
        *state = State::Armed {
            deadline: Instant::now() + self.quiet_period,
        };
        drop(state);
        self.shared.wake.notify_one();
    }

    /// Stop firing until the next `ping`. An in-flight action runs to
    /// completion but does not re-arm.
    pub fn pause(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if *state == State::Disposed {
            return;
        }
        *state = State::Paused;
        drop(state);
        self.shared.wake.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        *self.shared.state.lock().unwrap() == State::Paused
    }

    pub fn is_armed(&self) -> bool {
        matches!(
            *self.shared.state.lock().unwrap(),
            State::Armed { .. } | State::Running
        )
    }

    fn dispose(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if *state == State::Disposed {
            return;
        }
        *state = State::Disposed;
        drop(state);
        self.shared.wake.notify_one();
    }

    /// Dispose and wait for the worker task to exit. Any in-flight action
    /// runs to completion; no further firings happen.
    pub async fn shutdown(mut self) {
        self.dispose();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: Arc<AtomicUsize>) -> impl Fn() -> BoxFuture<'static, ()> + Send + Sync {
        move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_fire_until_pinged() {
        let count = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_secs(30), counting(count.clone()));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        debouncer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_quiet_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_secs(30), counting(count.clone()));

        debouncer.ping();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        debouncer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rearms_after_each_firing() {
        let count = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_secs(30), counting(count.clone()));

        debouncer.ping();
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        debouncer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ping_resets_countdown() {
        let count = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_secs(30), counting(count.clone()));

        debouncer.ping();
        tokio::time::sleep(Duration::from_secs(20)).await;
        debouncer.ping();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        debouncer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_firing_until_ping() {
        let count = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_secs(30), counting(count.clone()));

        debouncer.ping();
        debouncer.pause();
        assert!(debouncer.is_paused());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        debouncer.ping();
        assert!(!debouncer.is_paused());
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        debouncer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ping_during_action_delays_but_does_not_cancel() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let debouncer = Arc::new(Debouncer::new(Duration::from_secs(30), move || {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        debouncer.ping();
        // Into the action's own sleep, then ping mid-run.
        tokio::time::sleep(Duration::from_secs(35)).await;
        debouncer.ping();
        tokio::time::sleep(Duration::from_secs(6)).await;
        // The in-flight action completed despite the ping.
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Next firing is measured from the mid-run ping.
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_during_action_prevents_rearm() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let debouncer = Arc::new(Debouncer::new(Duration::from_secs(30), move || {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        debouncer.ping();
        tokio::time::sleep(Duration::from_secs(35)).await;
        debouncer.pause();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_prevents_pending_firing() {
        let count = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_secs(30), counting(count.clone()));

        debouncer.ping();
        debouncer.shutdown().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_is_idempotent_with_shutdown() {
        let count = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_secs(30), counting(count.clone()));
        debouncer.dispose();
        debouncer.dispose();
        drop(debouncer);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
