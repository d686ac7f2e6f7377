use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcMode {
    Auto,
    Cool,
    Heat,
    Dry,
    Fan,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    None,
    Auto,
    Quiet,
    Low,
    MediumLow,
    Medium,
    MediumHigh,
    High,
    Unknown,
}

impl PowerState {
    fn from_code(code: &str) -> Self {
        match code {
            "30" => PowerState::On,
            "31" => PowerState::Off,
            _ => PowerState::Unknown,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            PowerState::On => "30",
            // Unknown re-encodes as off; the unit ignores codes it doesn't know.
            PowerState::Off | PowerState::Unknown => "31",
        }
    }
}

impl AcMode {
    fn from_code(code: &str) -> Self {
        match code {
            "41" => AcMode::Auto,
            "42" => AcMode::Cool,
            "43" => AcMode::Heat,
            "44" => AcMode::Dry,
            "45" => AcMode::Fan,
            _ => AcMode::Unknown,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            AcMode::Cool => "42",
            AcMode::Heat => "43",
            AcMode::Dry => "44",
            AcMode::Fan => "45",
            AcMode::Auto | AcMode::Unknown => "41",
        }
    }
}

impl FanSpeed {
    fn from_code(code: &str) -> Self {
        match code {
            "41" => FanSpeed::Auto,
            "31" => FanSpeed::Quiet,
            "32" => FanSpeed::Low,
            "33" => FanSpeed::MediumLow,
            "34" => FanSpeed::Medium,
            "35" => FanSpeed::MediumHigh,
            "36" => FanSpeed::High,
            "00" => FanSpeed::None,
            _ => FanSpeed::Unknown,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            FanSpeed::Auto => "41",
            FanSpeed::Quiet => "31",
            FanSpeed::Low => "32",
            FanSpeed::MediumLow => "33",
            FanSpeed::Medium => "34",
            FanSpeed::MediumHigh => "35",
            FanSpeed::High => "36",
            FanSpeed::None | FanSpeed::Unknown => "00",
        }
    }
}

// Byte-pair offsets into the RAW state string (before padding).
const POWER_RANGE: std::ops::Range<usize> = 0..2;
const MODE_RANGE: std::ops::Range<usize> = 2..4;
const TARGET_TEMP_RANGE: std::ops::Range<usize> = 4..6;
const FAN_RANGE: std::ops::Range<usize> = 6..8;

// Offsets into the PADDED representation (see `pad`).
const INDOOR_TEMP_RANGE: std::ops::Range<usize> = 18..20;
const OUTDOOR_TEMP_RANGE: std::ops::Range<usize> = 20..22;

const MIN_RAW_LEN: usize = 20;

/// Semantic fields decoded from the unit's hex state string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitState {
    pub power: PowerState,
    pub mode: AcMode,
    pub target_temperature: i32,
    pub fan: FanSpeed,
    pub indoor_temperature: i32,
    pub outdoor_temperature: i32,
}

impl UnitState {
    /// Decode a raw state string. Unrecognized power/mode/fan codes map
    /// to the `Unknown` variants rather than failing; only a structurally
    /// malformed string (too short, non-hex temperature bytes) is an
    /// error.
    pub fn parse(raw: &str) -> Result<Self> {
        if !raw.is_ascii() || raw.len() < MIN_RAW_LEN {
            return Err(Error::Decode(format!(
                "state string too short or non-ascii: {raw:?}"
            )));
        }

        let padded = pad(raw);

        let power = PowerState::from_code(&padded[POWER_RANGE]);
        let mode = AcMode::from_code(&padded[MODE_RANGE]);
        let target_temperature = hex_byte(&padded[TARGET_TEMP_RANGE])?;
        let fan = FanSpeed::from_code(&padded[FAN_RANGE]);
        let indoor_temperature = hex_byte(&padded[INDOOR_TEMP_RANGE])?;
        let outdoor_temperature = normalize_outdoor(hex_byte(&padded[OUTDOOR_TEMP_RANGE])?);

        Ok(UnitState {
            power,
            mode,
            target_temperature,
            fan,
            indoor_temperature,
            outdoor_temperature,
        })
    }
}

// The unit sends a compressed string with two nibbles elided; re-insert
// zeros at offsets 12 and 14 so temperature fields land on fixed ranges.
fn pad(raw: &str) -> String {
    format!("{}0{}0{}", &raw[..12], &raw[12..13], &raw[13..])
}

fn hex_byte(pair: &str) -> Result<i32> {
    i32::from_str_radix(pair, 16)
        .map_err(|_| Error::Decode(format!("not a hex byte: {pair:?}")))
}

/// The outdoor sensor wraps above 128; values land back in range by
/// repeated subtraction. Exactly 128 stays 128.
fn normalize_outdoor(mut value: i32) -> i32 {
    while value > 128 {
        value -= 128;
    }
    value
}

/// Replace one byte pair of the raw string, leaving every other byte
/// untouched.
fn splice(raw: &str, range: std::ops::Range<usize>, code: &str) -> String {
    format!("{}{}{}", &raw[..range.start], code, &raw[range.end..])
}

pub(crate) fn splice_power(raw: &str, power: PowerState) -> String {
    splice(raw, POWER_RANGE, power.as_code())
}

pub(crate) fn splice_mode(raw: &str, mode: AcMode) -> String {
    splice(raw, MODE_RANGE, mode.as_code())
}

pub(crate) fn splice_target_temperature(raw: &str, temperature: i32) -> String {
    splice(raw, TARGET_TEMP_RANGE, &format!("{temperature:02X}"))
}

pub(crate) fn splice_fan(raw: &str, fan: FanSpeed) -> String {
    splice(raw, FAN_RANGE, fan.as_code())
}
