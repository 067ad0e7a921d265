//! Controller state and the handlers that apply channel events to it.
//!
//! Every handler takes the state lock once and does its whole
//! read-modify-write under it; notifications go out after the lock is
//! released.

use std::sync::atomic::AtomicBool;

use shared::domain::{ProcessStats, Schedule};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::{
    action_tracker::ActionTracker,
    connection::ChannelEvent,
    notifications::{NotificationLevel, Notifier},
    state_store::StateStore,
    ClientEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Create,
    Manage,
}

#[derive(Debug, Default)]
pub(crate) struct ControllerState {
    pub(crate) store: StateStore,
    pub(crate) tracker: ActionTracker,
    pub(crate) process_stats: Option<ProcessStats>,
    pub(crate) view: View,
    pub(crate) connected: bool,
}

pub(crate) struct Engine {
    pub(crate) state: Mutex<ControllerState>,
    pub(crate) notifier: Notifier,
    /// Outside the state lock so a dropped create can release it from `Drop`.
    pub(crate) create_in_flight: AtomicBool,
}

impl Engine {
    pub(crate) fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity);
        Self {
            state: Mutex::new(ControllerState::default()),
            notifier: Notifier::new(events),
            create_in_flight: AtomicBool::new(false),
        }
    }

    pub(crate) async fn handle_channel_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => self.set_connected(true).await,
            ChannelEvent::Disconnected => self.set_connected(false).await,
            ChannelEvent::Snapshot(schedules) => self.apply_snapshot(schedules).await,
            ChannelEvent::ProcessStats(stats) => {
                self.state.lock().await.process_stats = Some(stats.clone());
                self.notifier.emit(ClientEvent::ProcessStats(stats));
            }
        }
    }

    async fn set_connected(&self, connected: bool) {
        {
            let mut state = self.state.lock().await;
            if state.connected == connected {
                return;
            }
            state.connected = connected;
        }

        self.notifier
            .emit(ClientEvent::ConnectionChanged { connected });
        if connected {
            self.notifier
                .show(NotificationLevel::Success, "Connected to server");
        } else {
            self.notifier
                .show(NotificationLevel::Error, "Lost connection to server");
        }
    }

    async fn apply_snapshot(&self, schedules: Vec<Schedule>) {
        let (snapshot, resolved) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            state.store.replace(schedules);
            let resolved = state.tracker.reconcile(&state.store);
            (state.store.schedules().to_vec(), resolved)
        };

        info!(
            schedules = snapshot.len(),
            resolved_stops = resolved.len(),
            "applied schedule snapshot"
        );
        self.notifier.emit(ClientEvent::SchedulesUpdated(snapshot));
        for stop in resolved {
            self.notifier.publish(
                stop.notification,
                NotificationLevel::Success,
                format!("Stopped stream \"{}\"", stop.title),
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
