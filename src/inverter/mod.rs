mod types;

pub use types::{InverterData, InverterEnergy, InverterRuntime};

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::day_summary::{DaySummary, DaySummaryPoint, covers_end_of_day, today_utc};
use crate::debounce::Debouncer;
use crate::error::{Error, Result};
use crate::registry::{Registry, Stale};
use crate::retry::with_reauth;
use crate::signal::{ChangeSignal, ListenerId};
use crate::store::DaySummaryStore;
use crate::subscribers::{SubscribeOutcome, Subscribers, UnsubscribeOutcome};

/// Vendor monitoring portal for the inverter domain. Facet fetches
/// return `None` for "nothing to report", which is a valid no-update.
#[async_trait]
pub trait InverterApi: Send + Sync + 'static {
    async fn list_inverters(&self) -> Result<Vec<InverterData>>;
    async fn energy(&self, serial_num: &str) -> Result<Option<InverterEnergy>>;
    async fn runtime(&self, serial_num: &str) -> Result<Option<InverterRuntime>>;
    async fn day_summary(
        &self,
        serial_num: &str,
        date: NaiveDate,
    ) -> Result<Option<Vec<DaySummaryPoint>>>;
}

/// Registry entry for one inverter: the core profile plus the facets
/// that arrive on their own cadences.
#[derive(Debug)]
pub struct Inverter {
    data: InverterData,
    energy: Option<InverterEnergy>,
    runtime: Option<InverterRuntime>,
    day_summaries: BTreeMap<NaiveDate, Vec<DaySummaryPoint>>,
    stale: bool,
}

impl Inverter {
    fn new(data: InverterData) -> Self {
        Self {
            data,
            energy: None,
            runtime: None,
            day_summaries: BTreeMap::new(),
            stale: false,
        }
    }

    pub fn data(&self) -> &InverterData {
        &self.data
    }

    pub fn energy(&self) -> Option<&InverterEnergy> {
        self.energy.as_ref()
    }

    pub fn runtime(&self) -> Option<&InverterRuntime> {
        self.runtime.as_ref()
    }

    pub fn cached_day_summary(&self, date: NaiveDate) -> Option<&Vec<DaySummaryPoint>> {
        self.day_summaries.get(&date)
    }

    /// True once every required facet has arrived at least once.
    pub fn is_fully_loaded(&self) -> bool {
        self.energy.is_some() && self.runtime.is_some() && !self.day_summaries.is_empty()
    }

    /// Net household consumption in watts, derived from the live
    /// readings. Hybrid units (device type 2) feed PV string 1 straight
    /// to the house.
    pub fn consumption_power(&self) -> i32 {
        let Some(runtime) = &self.runtime else {
            return 0;
        };
        let pv_direct = if self.data.device_type == 2 {
            runtime.ppv1
        } else {
            0
        };
        pv_direct + (runtime.pinv - runtime.prec) + (runtime.p_to_user - runtime.p_to_grid)
    }
}

impl Stale for Inverter {
    fn is_stale(&self) -> bool {
        self.stale
    }

    fn set_stale(&mut self, stale: bool) {
        self.stale = stale;
    }
}

pub const DEFAULT_INVERTER_QUIET_PERIOD: Duration = Duration::from_secs(30);

/// In-memory view of all inverters, polled while subscribed. Each cycle
/// fans out the energy, runtime, and today's-summary facet fetches
/// concurrently per inverter and coalesces everything into at most one
/// change notification.
///
/// Must be constructed inside a Tokio runtime.
pub struct InverterService {
    inner: Arc<InverterInner>,
    debouncer: Debouncer,
}

struct InverterInner {
    api: Arc<dyn InverterApi>,
    store: Arc<dyn DaySummaryStore>,
    inverters: Registry<String, Inverter>,
    subscribers: Subscribers,
    changed: ChangeSignal,
}

impl InverterService {
    pub fn new(api: Arc<dyn InverterApi>, store: Arc<dyn DaySummaryStore>) -> Self {
        Self::with_quiet_period(api, store, DEFAULT_INVERTER_QUIET_PERIOD)
    }

    pub fn with_quiet_period(
        api: Arc<dyn InverterApi>,
        store: Arc<dyn DaySummaryStore>,
        quiet_period: Duration,
    ) -> Self {
        let inner = Arc::new(InverterInner {
            api,
            store,
            inverters: Registry::new(),
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
                    warn!(error = %error, "scheduled inverter refresh failed");
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

    pub fn inverter(&self, serial_num: &str) -> Option<Arc<Mutex<Inverter>>> {
        self.inner.inverters.get(&serial_num.to_string())
    }

    pub fn inverters(&self) -> Vec<Arc<Mutex<Inverter>>> {
        self.inner
            .inverters
            .entries()
            .into_iter()
            .map(|(_, inverter)| inverter)
            .collect()
    }

    /// Fetch-or-cache one day's samples for one inverter.
    ///
    /// Today is never trusted from any cache because its data keeps
    /// accruing. A past day already cached and complete is returned
    /// verbatim. Otherwise durable storage is consulted before the
    /// vendor, and a freshly fetched, complete past day is written
    /// through exactly once. Empty vendor results are returned empty and
    /// never persisted.
    pub async fn day_summary(
        &self,
        serial_num: &str,
        date: NaiveDate,
    ) -> Result<Vec<DaySummaryPoint>> {
        let entry = self
            .inverter(serial_num)
            .ok_or_else(|| Error::UnknownDevice(serial_num.to_string()))?;

        let is_today = date == today_utc();

        if !is_today {
            let cached = entry.lock().unwrap().cached_day_summary(date).cloned();
            if let Some(points) = cached
                && points.last().is_some_and(covers_end_of_day)
            {
                return Ok(points);
            }
        }

        let stored = if is_today {
            None
        } else {
            self.inner.store.get(date).await?.map(|summary| summary.points)
        };

        let points = match stored {
            Some(points) => points,
            None => {
                let fetched = self
                    .inner
                    .api
                    .day_summary(serial_num, date)
                    .await?
                    .unwrap_or_default();
                if fetched.is_empty() {
                    return Ok(vec![]);
                }
                if !is_today && fetched.last().is_some_and(covers_end_of_day) {
                    self.inner
                        .store
                        .put(&DaySummary { date, points: fetched.clone() })
                        .await?;
                }
                fetched
            }
        };

        entry
            .lock()
            .unwrap()
            .day_summaries
            .insert(date, points.clone());
        Ok(points)
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

impl InverterInner {
    /// One poll cycle. The list fetch (with bounded re-auth retry) gates
    /// the cycle; each inverter's facets are fetched concurrently and a
    /// failure in one facet only skips that facet's update.
    async fn refresh(&self) -> Result<()> {
        let inverters = with_reauth("inverter list", || self.api.list_inverters()).await?;

        let today = today_utc();
        let mut seen = HashSet::new();
        for data in &inverters {
            seen.insert(data.serial_num.clone());
        }

        let results = futures::future::join_all(
            inverters
                .into_iter()
                .map(|data| self.refresh_one(data, today)),
        )
        .await;
        let mut changed = results.into_iter().any(|inverter_changed| inverter_changed);

        changed |= self.inverters.mark_stale_except(&seen);

        if changed {
            debug!(inverters = self.inverters.len(), "inverter state changed");
            self.changed.emit();
        }
        Ok(())
    }

    async fn refresh_one(&self, data: InverterData, today: NaiveDate) -> bool {
        let serial_num = data.serial_num.clone();
        let (entry, created) = self
            .inverters
            .get_or_insert_with(&serial_num, || Inverter::new(data.clone()));

        let mut changed = created;
        if !created {
            let mut inverter = entry.lock().unwrap();
            if inverter.data != data {
                inverter.data = data;
                changed = true;
            }
        }

        let (energy, runtime, summary) = tokio::join!(
            self.api.energy(&serial_num),
            self.api.runtime(&serial_num),
            self.api.day_summary(&serial_num, today),
        );

        let mut inverter = entry.lock().unwrap();

        match energy {
            Ok(Some(energy)) if inverter.energy.as_ref() != Some(&energy) => {
                inverter.energy = Some(energy);
                changed = true;
            }
            Ok(_) => {}
            Err(error) => {
                warn!(serial = %serial_num, error = %error, "energy fetch failed, skipping facet");
            }
        }

        match runtime {
            Ok(Some(runtime)) if inverter.runtime.as_ref() != Some(&runtime) => {
                inverter.runtime = Some(runtime);
                changed = true;
            }
            Ok(_) => {}
            Err(error) => {
                warn!(serial = %serial_num, error = %error, "runtime fetch failed, skipping facet");
            }
        }

        match summary {
            Ok(Some(points))
                if inverter.day_summaries.get(&today) != Some(&points) =>
            {
                inverter.day_summaries.insert(today, points);
                changed = true;
            }
            Ok(_) => {}
            Err(error) => {
                warn!(serial = %serial_num, error = %error, "day summary fetch failed, skipping facet");
            }
        }

        changed
    }
}
