use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use homewatch::{
    DaySummaryPoint, DaySummaryStore, Error, InverterApi, InverterData, InverterEnergy,
    InverterRuntime, InverterService, MemoryStore, Result, today_utc,
};

fn inverter_data(serial: &str) -> InverterData {
    InverterData {
        serial_num: serial.to_string(),
        plant_name: "Home".into(),
        device_type: 2,
        power_rating: 3600,
        bat_capacity: 100,
        status: 0,
        lost: false,
        last_update_time: String::new(),
    }
}

fn energy(serial: &str, today_yielding: i32) -> InverterEnergy {
    InverterEnergy {
        serial_num: serial.to_string(),
        today_yielding,
        today_charging: 0,
        today_discharging: 0,
        today_usage: 0,
        today_import: 0,
        today_export: 0,
        total_yielding: 1000,
        total_usage: 800,
        total_charging: 0,
        total_discharging: 0,
    }
}

fn runtime(serial: &str, soc: i32) -> InverterRuntime {
    InverterRuntime {
        serial_num: serial.to_string(),
        status: 0,
        status_text: "Normal".into(),
        soc,
        v_bat: 520,
        ppv1: 1200,
        ppv2: 0,
        ppv3: 0,
        p_charge: 0,
        p_dis_charge: 300,
        pinv: 800,
        prec: 0,
        p_to_user: 200,
        p_to_grid: 0,
        device_time: String::new(),
    }
}

fn point(hour: u32, minute: u32) -> DaySummaryPoint {
    DaySummaryPoint {
        year: 2024,
        month: 1,
        day: 5,
        hour,
        minute,
        second: 0,
        time: format!("{hour:02}:{minute:02}"),
        solar_pv: 100,
        grid_power: 0,
        battery_discharging: 0,
        consumption: 80,
    }
}

#[derive(Default)]
struct MockInverterApi {
    inverters: Mutex<Vec<InverterData>>,
    energies: Mutex<HashMap<String, InverterEnergy>>,
    runtimes: Mutex<HashMap<String, InverterRuntime>>,
    day_summaries: Mutex<HashMap<(String, NaiveDate), Vec<DaySummaryPoint>>>,
    fail_energy_for: Mutex<HashSet<String>>,
    auth_failures_remaining: AtomicUsize,
    list_calls: AtomicUsize,
    day_summary_calls: AtomicUsize,
}

impl MockInverterApi {
    fn set_inverters(&self, inverters: Vec<InverterData>) {
        *self.inverters.lock().unwrap() = inverters;
    }

    fn set_energy(&self, serial: &str, value: InverterEnergy) {
        self.energies.lock().unwrap().insert(serial.to_string(), value);
    }

    fn set_runtime(&self, serial: &str, value: InverterRuntime) {
        self.runtimes.lock().unwrap().insert(serial.to_string(), value);
    }

    fn set_day_summary(&self, serial: &str, date: NaiveDate, points: Vec<DaySummaryPoint>) {
        self.day_summaries
            .lock()
            .unwrap()
            .insert((serial.to_string(), date), points);
    }
}

#[async_trait]
impl InverterApi for MockInverterApi {
    async fn list_inverters(&self) -> Result<Vec<InverterData>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        loop {
            let remaining = self.auth_failures_remaining.load(Ordering::SeqCst);
            if remaining == 0 {
                break;
            }
            if self
                .auth_failures_remaining
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Err(Error::Auth("session expired".into()));
            }
        }
        Ok(self.inverters.lock().unwrap().clone())
    }

    async fn energy(&self, serial_num: &str) -> Result<Option<InverterEnergy>> {
        if self.fail_energy_for.lock().unwrap().contains(serial_num) {
            return Err(Error::Transport("energy endpoint down".into()));
        }
        Ok(self.energies.lock().unwrap().get(serial_num).cloned())
    }

    async fn runtime(&self, serial_num: &str) -> Result<Option<InverterRuntime>> {
        Ok(self.runtimes.lock().unwrap().get(serial_num).cloned())
    }

    async fn day_summary(
        &self,
        serial_num: &str,
        date: NaiveDate,
    ) -> Result<Option<Vec<DaySummaryPoint>>> {
        self.day_summary_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .day_summaries
            .lock()
            .unwrap()
            .get(&(serial_num.to_string(), date))
            .cloned())
    }
}

fn setup(serials: &[&str]) -> (InverterService, Arc<MockInverterApi>, Arc<MemoryStore>) {
    let api = Arc::new(MockInverterApi::default());
    api.set_inverters(serials.iter().map(|s| inverter_data(s)).collect());
    let store = Arc::new(MemoryStore::new());
    let service = InverterService::new(api.clone(), store.clone());
    (service, api, store)
}

fn count_changes(service: &InverterService) -> Arc<AtomicUsize> {
    let changes = Arc::new(AtomicUsize::new(0));
    let changes_clone = changes.clone();
    service.on_changed(move || {
        changes_clone.fetch_add(1, Ordering::SeqCst);
    });
    changes
}

#[tokio::test]
async fn facet_failure_does_not_abort_cycle() {
    let (service, api, _store) = setup(&["A", "B"]);
    api.set_energy("A", energy("A", 10));
    api.set_energy("B", energy("B", 10));
    service.refresh_now().await.unwrap();

    // A's energy endpoint starts failing while B's moves on.
    api.fail_energy_for.lock().unwrap().insert("A".to_string());
    api.set_energy("B", energy("B", 20));

    let changes = count_changes(&service);
    service.refresh_now().await.unwrap();

    assert_eq!(changes.load(Ordering::SeqCst), 1);

    let a = service.inverter("A").unwrap();
    assert_eq!(a.lock().unwrap().energy().unwrap().today_yielding, 10);
    let b = service.inverter("B").unwrap();
    assert_eq!(b.lock().unwrap().energy().unwrap().today_yielding, 20);
}

#[tokio::test]
async fn identical_facets_emit_nothing() {
    let (service, api, _store) = setup(&["A"]);
    api.set_energy("A", energy("A", 10));
    api.set_runtime("A", runtime("A", 55));
    service.refresh_now().await.unwrap();

    let changes = count_changes(&service);
    service.refresh_now().await.unwrap();
    assert_eq!(changes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fully_loaded_requires_all_facets() {
    let (service, api, _store) = setup(&["A"]);
    api.set_energy("A", energy("A", 10));
    service.refresh_now().await.unwrap();

    let entry = service.inverter("A").unwrap();
    assert!(!entry.lock().unwrap().is_fully_loaded());

    api.set_runtime("A", runtime("A", 55));
    api.set_day_summary("A", today_utc(), vec![point(12, 0)]);
    service.refresh_now().await.unwrap();
    assert!(entry.lock().unwrap().is_fully_loaded());
}

#[tokio::test]
async fn consumption_power_derivation() {
    let (service, api, _store) = setup(&["A"]);
    api.set_runtime("A", runtime("A", 55));
    service.refresh_now().await.unwrap();

    let entry = service.inverter("A").unwrap();
    // Hybrid unit: ppv1 + (pinv - prec) + (pToUser - pToGrid).
    assert_eq!(entry.lock().unwrap().consumption_power(), 1200 + 800 + 200);
}

#[tokio::test]
async fn list_retries_through_auth_failures() {
    let (service, api, _store) = setup(&["A"]);
    api.auth_failures_remaining.store(2, Ordering::SeqCst);

    service.refresh_now().await.unwrap();
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 3);
    assert!(service.inverter("A").is_some());
}

#[tokio::test]
async fn list_gives_up_after_three_auth_failures() {
    let (service, api, _store) = setup(&["A"]);
    api.auth_failures_remaining.store(5, Ordering::SeqCst);

    let result = service.refresh_now().await;
    assert!(matches!(result, Err(Error::Auth(_))));
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 3);
    // The next cycle starts clean and succeeds.
    service.refresh_now().await.unwrap();
    assert!(service.inverter("A").is_some());
}

#[tokio::test]
async fn past_complete_day_is_persisted_once() {
    let (service, api, store) = setup(&["A"]);
    service.refresh_now().await.unwrap();

    let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    api.set_day_summary("A", date, vec![point(12, 0), point(23, 55)]);

    let baseline_vendor_calls = api.day_summary_calls.load(Ordering::SeqCst);

    let first = service.day_summary("A", date).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(store.put_count(), 1);
    assert_eq!(api.day_summary_calls.load(Ordering::SeqCst), baseline_vendor_calls + 1);

    // Second call: served from the entry cache, no vendor fetch, no new put.
    let second = service.day_summary("A", date).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(store.put_count(), 1);
    assert_eq!(api.day_summary_calls.load(Ordering::SeqCst), baseline_vendor_calls + 1);
}

#[tokio::test]
async fn durable_record_short_circuits_vendor() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

    // A fresh service whose store already holds the completed day.
    let (service, api, store) = setup(&["A"]);
    store
        .put(&homewatch::DaySummary { date, points: vec![point(23, 55)] })
        .await
        .unwrap();
    service.refresh_now().await.unwrap();

    let baseline_vendor_calls = api.day_summary_calls.load(Ordering::SeqCst);
    let points = service.day_summary("A", date).await.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(api.day_summary_calls.load(Ordering::SeqCst), baseline_vendor_calls);
}

#[tokio::test]
async fn incomplete_past_day_is_not_persisted() {
    let (service, api, store) = setup(&["A"]);
    service.refresh_now().await.unwrap();

    let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    api.set_day_summary("A", date, vec![point(18, 30)]);

    let points = service.day_summary("A", date).await.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(store.put_count(), 0);

    // Incomplete cache entry: the next call refetches from the vendor.
    let before = api.day_summary_calls.load(Ordering::SeqCst);
    api.set_day_summary("A", date, vec![point(18, 30), point(23, 55)]);
    let points = service.day_summary("A", date).await.unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(api.day_summary_calls.load(Ordering::SeqCst), before + 1);
    assert_eq!(store.put_count(), 1);
}

#[tokio::test]
async fn todays_summary_always_hits_the_vendor() {
    let (service, api, store) = setup(&["A"]);
    service.refresh_now().await.unwrap();

    let today = today_utc();
    api.set_day_summary("A", today, vec![point(23, 55)]);

    let before = api.day_summary_calls.load(Ordering::SeqCst);
    service.day_summary("A", today).await.unwrap();
    service.day_summary("A", today).await.unwrap();
    // Even a "complete-looking" cached entry for today is never trusted.
    assert_eq!(api.day_summary_calls.load(Ordering::SeqCst), before + 2);
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn empty_vendor_result_returns_empty_and_persists_nothing() {
    let (service, api, store) = setup(&["A"]);
    service.refresh_now().await.unwrap();

    let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    let points = service.day_summary("A", date).await.unwrap();
    assert!(points.is_empty());
    assert_eq!(store.put_count(), 0);
    assert!(api.day_summary_calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn day_summary_for_unknown_inverter_errors() {
    let (service, _api, _store) = setup(&["A"]);
    let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    let result = service.day_summary("missing", date).await;
    assert!(matches!(result, Err(Error::UnknownDevice(_))));
}
