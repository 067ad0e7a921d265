use std::{collections::HashMap, fmt};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(pub String);

impl ScheduleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScheduleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle status asserted by the remote authority.
///
/// Statuses this client does not know decode as [`ScheduleStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Pending,
    Live,
    Retrying,
    Stopping,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ScheduleStatus {
    pub const ALL: [ScheduleStatus; 6] = [
        ScheduleStatus::Pending,
        ScheduleStatus::Live,
        ScheduleStatus::Retrying,
        ScheduleStatus::Stopping,
        ScheduleStatus::Completed,
        ScheduleStatus::Failed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Failed)
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "PENDING",
            ScheduleStatus::Live => "LIVE",
            ScheduleStatus::Retrying => "RETRYING",
            ScheduleStatus::Stopping => "STOPPING",
            ScheduleStatus::Completed => "COMPLETED",
            ScheduleStatus::Failed => "FAILED",
            ScheduleStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: ScheduleId,
    pub title: String,
    pub video_identifier: String,
    pub broadcast_date_time: DateTime<Utc>,
    /// `None` repeats the video until stopped.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub rtmp_server: String,
    pub stream_key: String,
    pub status: ScheduleStatus,
}

impl Schedule {
    pub fn broadcast_label(&self) -> String {
        self.broadcast_date_time
            .with_timezone(&Local)
            .format("%H:%M - %d/%m/%Y")
            .to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStats {
    #[serde(default)]
    pub running_streams: usize,
    #[serde(default)]
    pub process_ids: HashMap<ScheduleId, u32>,
    #[serde(default)]
    pub retry_counts: HashMap<ScheduleId, u32>,
    #[serde(default)]
    pub processes: Vec<serde_json::Value>,
}
