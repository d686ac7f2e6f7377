use serde::Deserialize;

use crate::ac::state::{
    AcMode, FanSpeed, PowerState, UnitState, splice_fan, splice_mode, splice_power,
    splice_target_temperature,
};
use crate::error::Result;
use crate::property::Property;
use crate::registry::Stale;

/// One unit as returned by the vendor's device-list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AcUnitDetails {
    pub id: String,
    pub device_unique_id: String,
    pub name: String,
    #[serde(rename = "ACStateData")]
    pub ac_state_data: String,
}

/// Registry entry for one AC unit: the last raw state string plus its
/// decoded fields, each held as a target/current pair.
///
/// Command methods optimistically move the target side and return the
/// re-encoded raw string for the caller to send to the vendor; the
/// current side only moves when a poll or push confirms new state.
#[derive(Debug)]
pub struct AcUnit {
    id: String,
    device_unique_id: String,
    name: String,
    raw_state: String,
    stale: bool,

    pub power: Property<PowerState>,
    pub mode: Property<AcMode>,
    pub target_temperature: Property<i32>,
    pub fan: Property<FanSpeed>,
    pub indoor_temperature: Property<i32>,
    pub outdoor_temperature: Property<i32>,
}

impl AcUnit {
    pub fn new(details: &AcUnitDetails) -> Result<Self> {
        let state = UnitState::parse(&details.ac_state_data)?;
        Ok(Self {
            id: details.id.clone(),
            device_unique_id: details.device_unique_id.clone(),
            name: details.name.clone(),
            raw_state: details.ac_state_data.clone(),
            stale: false,
            power: Property::new(state.power),
            mode: Property::new(state.mode),
            target_temperature: Property::new(state.target_temperature),
            fan: Property::new(state.fan),
            indoor_temperature: Property::new(state.indoor_temperature),
            outdoor_temperature: Property::new(state.outdoor_temperature),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_unique_id(&self) -> &str {
        &self.device_unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_state(&self) -> &str {
        &self.raw_state
    }

    /// Decode a fresh raw state and reset every property from it, target
    /// and current both. Returns whether any field actually changed;
    /// simultaneous field updates coalesce into that single flag.
    pub fn apply_raw(&mut self, raw: &str) -> Result<bool> {
        let state = UnitState::parse(raw)?;
        self.raw_state = raw.to_string();

        let mut changed = false;
        changed |= self.power.reset(state.power);
        changed |= self.mode.reset(state.mode);
        changed |= self.target_temperature.reset(state.target_temperature);
        changed |= self.fan.reset(state.fan);
        changed |= self.indoor_temperature.reset(state.indoor_temperature);
        changed |= self.outdoor_temperature.reset(state.outdoor_temperature);
        Ok(changed)
    }

    /// Flip the power target and splice the power byte pair. Calling
    /// twice returns the raw state to its original power byte with every
    /// other byte untouched.
    pub fn toggle_power(&mut self) -> (String, bool) {
        let next = match self.power.target() {
            PowerState::On => PowerState::Off,
            _ => PowerState::On,
        };
        let changed = self.power.set_target(next);
        (splice_power(&self.raw_state, next), changed)
    }

    pub fn set_target_temperature(&mut self, temperature: i32) -> (String, bool) {
        let changed = self.target_temperature.set_target(temperature);
        (
            splice_target_temperature(&self.raw_state, temperature),
            changed,
        )
    }

    pub fn set_mode(&mut self, mode: AcMode) -> (String, bool) {
        let changed = self.mode.set_target(mode);
        (splice_mode(&self.raw_state, mode), changed)
    }

    pub fn set_fan(&mut self, fan: FanSpeed) -> (String, bool) {
        let changed = self.fan.set_target(fan);
        (splice_fan(&self.raw_state, fan), changed)
    }
}

impl Stale for AcUnit {
    fn is_stale(&self) -> bool {
        self.stale
    }

    fn set_stale(&mut self, stale: bool) {
        self.stale = stale;
    }
}
