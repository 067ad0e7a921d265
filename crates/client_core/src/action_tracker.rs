//! Pending stop requests, keyed by schedule id, waiting for a snapshot that
//! shows the schedule COMPLETED.

use std::collections::HashMap;

use shared::domain::{ScheduleId, ScheduleStatus};
use tracing::{debug, info};

use crate::{notifications::NotificationId, state_store::StateStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStop {
    pub schedule_id: ScheduleId,
    pub title: String,
    pub notification: NotificationId,
}

#[derive(Debug, Default)]
pub struct ActionTracker {
    pending: HashMap<ScheduleId, NotificationId>,
}

impl ActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle previously tracked for `id`, if any.
    pub fn track(
        &mut self,
        id: ScheduleId,
        notification: NotificationId,
    ) -> Option<NotificationId> {
        self.pending.insert(id, notification)
    }

    pub fn get(&self, id: &ScheduleId) -> Option<NotificationId> {
        self.pending.get(id).copied()
    }

    pub fn forget(&mut self, id: &ScheduleId) -> Option<NotificationId> {
        self.pending.remove(id)
    }

    pub fn pending_ids(&self) -> Vec<ScheduleId> {
        let mut ids: Vec<_> = self.pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drains every entry whose schedule is COMPLETED in `store`.
    ///
    /// Entries whose schedule is still running, failed, or missing from the
    /// snapshot stay pending; there is no other way for them to leave.
    pub fn reconcile(&mut self, store: &StateStore) -> Vec<ResolvedStop> {
        let mut resolved = Vec::new();
        self.pending.retain(|id, notification| match store.get(id) {
            Some(schedule) if schedule.status == ScheduleStatus::Completed => {
                resolved.push(ResolvedStop {
                    schedule_id: id.clone(),
                    title: schedule.title.clone(),
                    notification: *notification,
                });
                false
            }
            Some(schedule) => {
                debug!(schedule_id = %id, status = %schedule.status, "stop still pending");
                true
            }
            None => {
                debug!(schedule_id = %id, "tracked schedule absent from snapshot");
                true
            }
        });
        resolved.sort_by(|a, b| a.schedule_id.cmp(&b.schedule_id));
        for stop in &resolved {
            info!(schedule_id = %stop.schedule_id, "stop confirmed by snapshot");
        }
        resolved
    }
}

#[cfg(test)]
#[path = "tests/action_tracker_tests.rs"]
mod tests;
