mod ac;
mod day_summary;
mod debounce;
mod doorbell;
mod error;
mod inverter;
mod property;
mod registry;
mod retry;
mod signal;
mod store;
mod subscribers;

pub use ac::{
    AcApi, AcMode, AcService, AcUnit, AcUnitDetails, DEFAULT_AC_QUIET_PERIOD, FanSpeed,
    PowerState, UnitState,
};
pub use day_summary::{DaySummary, DaySummaryPoint, today_utc};
pub use debounce::Debouncer;
pub use doorbell::{
    DEFAULT_DOORBELL_QUIET_PERIOD, Doorbell, DoorbellApi, DoorbellKind, DoorbellService,
    DoorbellSummary, HistoryEvent, Snapshot,
};
pub use error::{Error, Result};
pub use inverter::{
    DEFAULT_INVERTER_QUIET_PERIOD, Inverter, InverterApi, InverterData, InverterEnergy,
    InverterRuntime, InverterService,
};
pub use property::Property;
pub use registry::{Registry, Stale};
pub use retry::with_reauth;
pub use signal::{ChangeSignal, ListenerId};
pub use store::{DaySummaryStore, JsonFileStore, MemoryStore};
pub use subscribers::{SubscribeOutcome, Subscribers, UnsubscribeOutcome};
