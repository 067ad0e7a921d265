use std::time::Duration;

use shared::domain::{ScheduleId, ScheduleStatus};
use thiserror::Error;

use crate::{status_policy::ScheduleAction, validation::DraftField};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected to the scheduling server")]
    NotConnected,
    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to connect websocket {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("failed to encode {command}: {source}")]
    Encode {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to send {command}: {reason}")]
    Send {
        command: &'static str,
        reason: String,
    },
    #[error("channel closed before acknowledgement {ack_id} arrived")]
    ChannelClosed { ack_id: u64 },
    #[error("no acknowledgement for {ack_id} within {timeout:?}")]
    AckTimeout { ack_id: u64, timeout: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: DraftField,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schedule request: {}", join_field_errors(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn has(&self, field: DraftField) -> bool {
        self.0.iter().any(|error| error.field == field)
    }

    pub fn message_for(&self, field: DraftField) -> Option<&str> {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    pub fn fields(&self) -> Vec<DraftField> {
        self.0.iter().map(|error| error.field).collect()
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("a create request is already awaiting acknowledgement")]
    CreateInFlight,
    #[error("schedule {0} is not in the current snapshot")]
    UnknownSchedule(ScheduleId),
    #[error("cannot {action} schedule {id} while it is {status}")]
    ActionNotAllowed {
        action: ScheduleAction,
        id: ScheduleId,
        status: ScheduleStatus,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}
