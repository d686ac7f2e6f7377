use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One time-series sample from an inverter's per-day chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummaryPoint {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    #[serde(default)]
    pub time: String,
    pub solar_pv: i32,
    pub grid_power: i32,
    pub battery_discharging: i32,
    pub consumption: i32,
}

/// A full day's samples for one device. Considered complete once the
/// last sample reaches 23:50; incomplete past days are refetched on next
/// access, and today's entry is never final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub points: Vec<DaySummaryPoint>,
}

impl DaySummary {
    pub fn is_complete(&self) -> bool {
        self.points.last().is_some_and(covers_end_of_day)
    }
}

pub(crate) fn covers_end_of_day(last_point: &DaySummaryPoint) -> bool {
    last_point.hour == 23 && last_point.minute >= 50
}

pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
