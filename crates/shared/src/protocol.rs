use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ProcessStats, Schedule, ScheduleId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub title: String,
    pub video_identifier: String,
    pub broadcast_date_time: DateTime<Utc>,
    pub rtmp_server: String,
    pub stream_key: String,
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientCommand {
    CreateSchedule(CreateScheduleRequest),
    StopSchedule { id: ScheduleId },
    DeleteSchedule { id: ScheduleId },
    EmergencyStopAll,
    GetProcessStats,
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::CreateSchedule(_) => "create_schedule",
            ClientCommand::StopSchedule { .. } => "stop_schedule",
            ClientCommand::DeleteSchedule { .. } => "delete_schedule",
            ClientCommand::EmergencyStopAll => "emergency_stop_all",
            ClientCommand::GetProcessStats => "get_process_stats",
        }
    }
}

/// Outbound frame. `ack_id` is only set for commands awaiting a correlated
/// [`CommandAck`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_id: Option<u64>,
    pub command: ClientCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandAck {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    BroadcastUpdate(Vec<Schedule>),
    ProcessStats(ProcessStats),
    Ack { ack_id: u64, ack: CommandAck },
}
