mod types;

pub use types::{DoorbellKind, DoorbellSummary, HistoryEvent, Snapshot};

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::debounce::Debouncer;
use crate::error::Result;
use crate::registry::{Registry, Stale};
use crate::signal::{ChangeSignal, ListenerId};
use crate::subscribers::{SubscribeOutcome, Subscribers, UnsubscribeOutcome};

/// Vendor cloud API for the doorbell/camera domain.
#[async_trait]
pub trait DoorbellApi: Send + Sync + 'static {
    async fn list_devices(&self) -> Result<Vec<DoorbellSummary>>;
    /// Ask the vendor to capture a fresh snapshot server-side. Safe to
    /// call repeatedly; the vendor de-dupes.
    async fn request_snapshot(&self, device_id: i64) -> Result<()>;
    /// Capture time of the newest server-side snapshot, if any exists.
    async fn latest_snapshot_time(&self, device_id: i64) -> Result<Option<DateTime<Utc>>>;
    /// The newest snapshot image; `None` when no image exists yet.
    async fn latest_snapshot(&self, device_id: i64) -> Result<Option<Vec<u8>>>;
    /// History events strictly after `since`, or the default page when
    /// `since` is `None`.
    async fn history_since(
        &self,
        device_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<HistoryEvent>>;
}

/// Registry entry for one doorbell or camera.
#[derive(Debug)]
pub struct Doorbell {
    id: i64,
    description: String,
    kind: DoorbellKind,
    latest_snapshot: Option<Snapshot>,
    events_by_id: BTreeMap<i64, HistoryEvent>,
    stale: bool,
}

impl Doorbell {
    fn new(summary: &DoorbellSummary) -> Self {
        Self {
            id: summary.id,
            description: summary.description.clone(),
            kind: summary.kind,
            latest_snapshot: None,
            events_by_id: BTreeMap::new(),
            stale: false,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> DoorbellKind {
        self.kind
    }

    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.latest_snapshot.as_ref()
    }

    /// History newest-first, with the synthetic "on_demand" entries the
    /// vendor logs for live views filtered out.
    pub fn events_in_order(&self) -> Vec<HistoryEvent> {
        let mut events: Vec<HistoryEvent> = self
            .events_by_id
            .values()
            .filter(|event| event.kind != "on_demand")
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events
    }

    fn latest_event_time(&self) -> Option<DateTime<Utc>> {
        self.events_by_id
            .values()
            .map(|event| event.created_at)
            .max()
    }

    /// Append events not yet known, keyed by id. Returns how many were
    /// new.
    fn merge_events(&mut self, events: Vec<HistoryEvent>) -> usize {
        let mut added = 0;
        for event in events {
            if let std::collections::btree_map::Entry::Vacant(slot) =
                self.events_by_id.entry(event.id)
            {
                slot.insert(event);
                added += 1;
            }
        }
        added
    }
}

impl Stale for Doorbell {
    fn is_stale(&self) -> bool {
        self.stale
    }

    fn set_stale(&mut self, stale: bool) {
        self.stale = stale;
    }
}

pub const DEFAULT_DOORBELL_QUIET_PERIOD: Duration = Duration::from_secs(5);

/// In-memory view of all doorbell/camera devices, polled while
/// subscribed. Snapshots are only downloaded when the vendor-reported
/// capture time moves; history merges incrementally by event id.
///
/// Must be constructed inside a Tokio runtime.
pub struct DoorbellService {
    inner: Arc<DoorbellInner>,
    debouncer: Debouncer,
}

struct DoorbellInner {
    api: Arc<dyn DoorbellApi>,
    devices: Registry<i64, Doorbell>,
    subscribers: Subscribers,
    changed: ChangeSignal,
}

impl DoorbellService {
    pub fn new(api: Arc<dyn DoorbellApi>) -> Self {
        Self::with_quiet_period(api, DEFAULT_DOORBELL_QUIET_PERIOD)
    }

    pub fn with_quiet_period(api: Arc<dyn DoorbellApi>, quiet_period: Duration) -> Self {
        let inner = Arc::new(DoorbellInner {
            api,
            devices: Registry::new(),
            subscribers: Subscribers::new(),
            changed: ChangeSignal::new(),
        });

        let weak = Arc::downgrade(&inner);
        let debouncer = Debouncer::new(quiet_period, move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.subscribers.active() {
                    return;
                }
                if let Err(error) = inner.refresh().await {
                    warn!(error = %error, "scheduled doorbell refresh failed");
                }
            }
        });

        Self { inner, debouncer }
    }

    pub async fn subscribe(&self) -> Result<()> {
        if self.inner.subscribers.add() != SubscribeOutcome::First {
            return Ok(());
        }
        match self.inner.refresh().await {
            Ok(()) => {
                self.debouncer.ping();
                Ok(())
            }
            Err(error) => {
                self.debouncer.pause();
                Err(error)
            }
        }
    }

    pub fn unsubscribe(&self) {
        if self.inner.subscribers.remove() == UnsubscribeOutcome::Last {
            self.debouncer.pause();
        }
    }

    pub async fn refresh_now(&self) -> Result<()> {
        self.debouncer.ping();
        self.inner.refresh().await
    }

    pub fn on_changed(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.inner.changed.subscribe(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.inner.changed.unsubscribe(id);
    }

    pub fn device(&self, device_id: i64) -> Option<Arc<Mutex<Doorbell>>> {
        self.inner.devices.get(&device_id)
    }

    pub fn devices(&self) -> Vec<Arc<Mutex<Doorbell>>> {
        self.inner
            .devices
            .entries()
            .into_iter()
            .map(|(_, device)| device)
            .collect()
    }

    pub fn subscriber_count(&self) -> i64 {
        self.inner.subscribers.count()
    }

    pub fn is_polling_paused(&self) -> bool {
        self.debouncer.is_paused()
    }

    pub async fn shutdown(self) {
        self.debouncer.shutdown().await;
    }
}

impl DoorbellInner {
    async fn refresh(&self) -> Result<()> {
        let summaries = self.api.list_devices().await?;

        let mut seen = HashSet::new();
        for summary in &summaries {
            seen.insert(summary.id);
        }

        let results = futures::future::join_all(
            summaries.iter().map(|summary| self.refresh_one(summary)),
        )
        .await;
        let mut changed = results.into_iter().any(|device_changed| device_changed);

        changed |= self.devices.mark_stale_except(&seen);

        if changed {
            debug!(devices = self.devices.len(), "doorbell state changed");
            self.changed.emit();
        }
        Ok(())
    }

    async fn refresh_one(&self, summary: &DoorbellSummary) -> bool {
        let (entry, created) = self
            .devices
            .get_or_insert_with(&summary.id, || Doorbell::new(summary));

        let mut changed = created;
        if created {
            // Kick off a server-side capture so the first real snapshot
            // exists by the next cycle. Racing discoveries are fine; the
            // vendor de-dupes capture requests.
            if let Err(error) = self.api.request_snapshot(summary.id).await {
                debug!(device = summary.id, error = %error, "snapshot request failed");
            }
        } else {
            let mut device = entry.lock().unwrap();
            if device.description != summary.description {
                device.description = summary.description.clone();
                changed = true;
            }
        }

        let since = {
            let device = entry.lock().unwrap();
            device
                .latest_event_time()
                .map(|newest| newest + TimeDelta::seconds(1))
        };
        let known_snapshot_time = entry.lock().unwrap().latest_snapshot.as_ref().map(|s| s.taken_at);

        let (snapshot, history) = tokio::join!(
            self.fetch_snapshot_if_newer(summary.id, known_snapshot_time),
            self.api.history_since(summary.id, since),
        );

        let mut device = entry.lock().unwrap();

        if let Some(snapshot) = snapshot {
            device.latest_snapshot = Some(snapshot);
            changed = true;
        }

        match history {
            Ok(events) => {
                if device.merge_events(events) > 0 {
                    changed = true;
                }
            }
            Err(error) => {
                warn!(device = summary.id, error = %error, "history fetch failed, skipping facet");
            }
        }

        changed
    }

    /// Snapshot facet: download only when the vendor reports a capture
    /// time newer than what we hold. Any failure here (including the
    /// image not existing yet) is a no-update for this cycle.
    async fn fetch_snapshot_if_newer(
        &self,
        device_id: i64,
        known_time: Option<DateTime<Utc>>,
    ) -> Option<Snapshot> {
        let taken_at = match self.api.latest_snapshot_time(device_id).await {
            Ok(Some(taken_at)) => taken_at,
            Ok(None) => return None,
            Err(error) => {
                warn!(device = device_id, error = %error, "snapshot timestamp fetch failed");
                return None;
            }
        };
        if known_time == Some(taken_at) {
            return None;
        }
        match self.api.latest_snapshot(device_id).await {
            Ok(Some(image)) => Some(Snapshot { taken_at, image }),
            Ok(None) => None,
            Err(error) => {
                warn!(device = device_id, error = %error, "snapshot fetch failed, keeping previous");
                None
            }
        }
    }
}
