//! Which actions a schedule's current status allows, and how it is labelled.

use std::fmt;

use shared::domain::ScheduleStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleAction {
    Stop,
    Delete,
}

impl fmt::Display for ScheduleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleAction::Stop => f.write_str("stop"),
            ScheduleAction::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    pub label: &'static str,
    pub can_stop: bool,
    pub can_delete: bool,
}

impl StatusPolicy {
    pub const fn for_status(status: ScheduleStatus) -> Self {
        match status {
            ScheduleStatus::Pending => Self::new("Pending", false, true),
            ScheduleStatus::Live => Self::new("Live", true, false),
            ScheduleStatus::Retrying => Self::new("Retrying", true, false),
            ScheduleStatus::Stopping => Self::new("Stopping", false, false),
            ScheduleStatus::Completed => Self::new("Completed", false, true),
            ScheduleStatus::Failed => Self::new("Failed", false, true),
            ScheduleStatus::Unknown => Self::new("Unknown", false, false),
        }
    }

    const fn new(label: &'static str, can_stop: bool, can_delete: bool) -> Self {
        Self {
            label,
            can_stop,
            can_delete,
        }
    }

    pub fn allows(&self, action: ScheduleAction) -> bool {
        match action {
            ScheduleAction::Stop => self.can_stop,
            ScheduleAction::Delete => self.can_delete,
        }
    }
}

#[cfg(test)]
#[path = "tests/status_policy_tests.rs"]
mod tests;
