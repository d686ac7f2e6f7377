mod state;
mod unit;

pub use state::{AcMode, FanSpeed, PowerState, UnitState};
pub use unit::{AcUnit, AcUnitDetails};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::debounce::Debouncer;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::signal::{ChangeSignal, ListenerId};
use crate::subscribers::{SubscribeOutcome, Subscribers, UnsubscribeOutcome};

/// Vendor cloud API for the AC domain. One round trip per call; the
/// implementation owns authentication and request shaping.
#[async_trait]
pub trait AcApi: Send + Sync + 'static {
    async fn list_units(&self) -> Result<Vec<AcUnitDetails>>;
}

pub const DEFAULT_AC_QUIET_PERIOD: Duration = Duration::from_secs(30);

/// In-memory view of all AC units, kept fresh by a debounced poll while
/// anyone is subscribed and by push notifications from the vendor's
/// message stream. Units get no push updates for temperature readings,
/// so the poll keeps running even when pushes arrive.
///
/// Must be constructed inside a Tokio runtime.
pub struct AcService {
    inner: Arc<AcInner>,
    debouncer: Debouncer,
}

struct AcInner {
    api: Arc<dyn AcApi>,
    units: Registry<String, AcUnit>,
    subscribers: Subscribers,
    changed: ChangeSignal,
}

impl AcService {
    pub fn new(api: Arc<dyn AcApi>) -> Self {
        Self::with_quiet_period(api, DEFAULT_AC_QUIET_PERIOD)
    }

    pub fn with_quiet_period(api: Arc<dyn AcApi>, quiet_period: Duration) -> Self {
        let inner = Arc::new(AcInner {
            api,
            units: Registry::new(),
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
                    warn!(error = %error, "scheduled AC refresh failed");
                }
            }
        });

        Self { inner, debouncer }
    }

    /// Register a UI consumer. The 0 -> 1 transition refreshes
    /// immediately (errors propagate to this caller and leave polling
    /// paused) and arms the poll scheduler; other transitions only
    /// increment the count.
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

    /// Drop a UI consumer. The 1 -> 0 transition pauses polling; an
    /// in-flight refresh completes.
    pub fn unsubscribe(&self) {
        if self.inner.subscribers.remove() == UnsubscribeOutcome::Last {
            self.debouncer.pause();
        }
    }

    /// Force a refresh cycle outside the schedule, restarting the quiet
    /// period so the next scheduled poll is measured from now.
    pub async fn refresh_now(&self) -> Result<()> {
        self.debouncer.ping();
        self.inner.refresh().await
    }

    /// Feed one push-delivered `(device, raw state)` event: merges into
    /// the unit if it is known and nudges the poll scheduler so an
    /// authoritative cycle reconciles soon after the burst settles.
    pub fn handle_push(&self, device_unique_id: &str, raw_state: &str) {
        if self.inner.subscribers.active() {
            self.debouncer.ping();
        }

        let Some(entry) = self.inner.units.get(&device_unique_id.to_string()) else {
            return;
        };
        let changed = {
            let mut unit = entry.lock().unwrap();
            match unit.apply_raw(raw_state) {
                Ok(changed) => changed,
                Err(error) => {
                    warn!(device = device_unique_id, error = %error, "undecodable pushed state");
                    return;
                }
            }
        };
        if changed {
            self.inner.changed.emit();
        }
    }

    pub fn on_changed(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.inner.changed.subscribe(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.inner.changed.unsubscribe(id);
    }

    pub fn unit(&self, device_unique_id: &str) -> Option<Arc<Mutex<AcUnit>>> {
        self.inner.units.get(&device_unique_id.to_string())
    }

    pub fn units(&self) -> Vec<Arc<Mutex<AcUnit>>> {
        self.inner
            .units
            .entries()
            .into_iter()
            .map(|(_, unit)| unit)
            .collect()
    }

    /// Last confirmed outdoor reading from any unit; they all share one
    /// outdoor sensor.
    pub fn outside_temp(&self) -> Option<i32> {
        self.units()
            .first()
            .map(|unit| *unit.lock().unwrap().outdoor_temperature.current())
    }

    /// Flip a unit's power, returning the raw command string to send to
    /// the vendor. The target side updates optimistically; one change
    /// notification fires if it moved.
    pub fn toggle_power(&self, device_unique_id: &str) -> Result<String> {
        self.command(device_unique_id, AcUnit::toggle_power)
    }

    pub fn set_target_temperature(&self, device_unique_id: &str, temperature: i32) -> Result<String> {
        self.command(device_unique_id, |unit| {
            unit.set_target_temperature(temperature)
        })
    }

    pub fn set_mode(&self, device_unique_id: &str, mode: AcMode) -> Result<String> {
        self.command(device_unique_id, |unit| unit.set_mode(mode))
    }

    pub fn set_fan(&self, device_unique_id: &str, fan: FanSpeed) -> Result<String> {
        self.command(device_unique_id, |unit| unit.set_fan(fan))
    }

    fn command(
        &self,
        device_unique_id: &str,
        apply: impl FnOnce(&mut AcUnit) -> (String, bool),
    ) -> Result<String> {
        let entry = self
            .inner
            .units
            .get(&device_unique_id.to_string())
            .ok_or_else(|| Error::UnknownDevice(device_unique_id.to_string()))?;
        let (raw, changed) = apply(&mut entry.lock().unwrap());
        if changed {
            self.inner.changed.emit();
        }
        Ok(raw)
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

impl AcInner {
    /// One poll cycle: list units, lazily create entries, value-compare
    /// raw state for existing ones, then emit at most one change
    /// notification for the whole cycle.
    async fn refresh(&self) -> Result<()> {
        let details = self.api.list_units().await?;

        let mut changed = false;
        let mut seen = HashSet::new();

        for unit_details in &details {
            seen.insert(unit_details.device_unique_id.clone());

            if let Some(entry) = self.units.get(&unit_details.device_unique_id) {
                let mut unit = entry.lock().unwrap();
                match unit.apply_raw(&unit_details.ac_state_data) {
                    Ok(unit_changed) => changed |= unit_changed,
                    Err(error) => {
                        warn!(
                            device = %unit_details.device_unique_id,
                            error = %error,
                            "undecodable unit state, keeping previous"
                        );
                    }
                }
            } else {
                match AcUnit::new(unit_details) {
                    Ok(unit) => {
                        self.units
                            .get_or_insert_with(&unit_details.device_unique_id, || unit);
                        changed = true;
                    }
                    Err(error) => {
                        warn!(
                            device = %unit_details.device_unique_id,
                            error = %error,
                            "skipping unit with undecodable state"
                        );
                    }
                }
            }
        }

        changed |= self.units.mark_stale_except(&seen);

        if changed {
            debug!(units = self.units.len(), "AC state changed");
            self.changed.emit();
        }
        Ok(())
    }
}
