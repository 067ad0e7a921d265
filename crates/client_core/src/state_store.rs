use std::collections::HashMap;

use shared::domain::{Schedule, ScheduleId};
use tracing::warn;

/// Last full snapshot of schedules. Replaced wholesale, never patched.
#[derive(Debug, Default, Clone)]
pub struct StateStore {
    schedules: Vec<Schedule>,
    index: HashMap<ScheduleId, usize>,
    received_snapshot: bool,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, snapshot: Vec<Schedule>) {
        let mut index = HashMap::with_capacity(snapshot.len());
        for (position, schedule) in snapshot.iter().enumerate() {
            if index.contains_key(&schedule.id) {
                warn!(schedule_id = %schedule.id, "snapshot repeats schedule id; keeping first entry for lookups");
                continue;
            }
            index.insert(schedule.id.clone(), position);
        }
        self.schedules = snapshot;
        self.index = index;
        self.received_snapshot = true;
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn get(&self, id: &ScheduleId) -> Option<&Schedule> {
        self.index
            .get(id)
            .and_then(|position| self.schedules.get(*position))
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    /// False until the first snapshot after construction.
    pub fn received_snapshot(&self) -> bool {
        self.received_snapshot
    }
}

#[cfg(test)]
#[path = "tests/state_store_tests.rs"]
mod tests;
