use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorbellKind {
    Doorbot,
    StickupCam,
}

/// One camera device as returned by the vendor's device list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DoorbellSummary {
    pub id: i64,
    pub description: String,
    pub kind: DoorbellKind,
}

/// One motion/ding/on-demand event from the device history feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryEvent {
    pub id: i64,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// A still image the vendor captured server-side, keyed by capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub image: Vec<u8>,
}
