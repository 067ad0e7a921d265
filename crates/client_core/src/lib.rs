use std::sync::Arc;

use shared::domain::{ProcessStats, Schedule, ScheduleId};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::debug;

pub mod action_tracker;
pub mod config;
pub mod confirmation;
pub mod connection;
pub mod dispatcher;
mod engine;
pub mod error;
pub mod notifications;
pub mod state_store;
pub mod status_policy;
pub mod validation;

pub use config::{load_settings, load_settings_from, ClientSettings};
pub use confirmation::{AutoConfirm, ConfirmationGate, DenyAll};
pub use connection::{ChannelEvent, CommandChannel, ConnectionManager, ReconnectPolicy};
pub use dispatcher::{CommandDispatcher, CommandOutcome, CreateOutcome, CREATE_FALLBACK_ERROR};
pub use engine::View;
pub use error::{DispatchError, FieldError, TransportError, ValidationErrors};
pub use notifications::{Notification, NotificationId, NotificationLevel};
pub use status_policy::{ScheduleAction, StatusPolicy};
pub use validation::{DraftField, DurationChoice, ScheduleDraft};

use engine::Engine;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    ConnectionChanged { connected: bool },
    SchedulesUpdated(Vec<Schedule>),
    Notification(Notification),
    ViewChanged(View),
    ProcessStats(ProcessStats),
}

/// Owns one channel to the scheduling server and everything derived from it.
///
/// Must be created inside a Tokio runtime: construction spawns the task that
/// applies channel events in arrival order.
pub struct ScheduleController {
    connection: Arc<ConnectionManager>,
    dispatcher: CommandDispatcher,
    engine: Arc<Engine>,
    event_loop: JoinHandle<()>,
}

impl ScheduleController {
    pub fn new(
        settings: &ClientSettings,
        gate: Arc<dyn ConfirmationGate>,
    ) -> Result<Self, TransportError> {
        let (connection, channel_events) = ConnectionManager::new(
            &settings.server_url,
            ReconnectPolicy::from_settings(settings),
        )?;
        let engine = Arc::new(Engine::new(EVENT_CAPACITY));
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&connection) as Arc<dyn CommandChannel>,
            Arc::clone(&engine),
            gate,
            settings,
        );
        let event_loop = spawn_event_loop(Arc::clone(&engine), channel_events);
        Ok(Self {
            connection,
            dispatcher,
            engine,
            event_loop,
        })
    }

    pub async fn connect(&self) -> Result<(), TransportError> {
        self.connection.connect().await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.engine.notifier.subscribe()
    }

    pub async fn is_connected(&self) -> bool {
        self.engine.state.lock().await.connected
    }

    pub async fn schedules(&self) -> Vec<Schedule> {
        self.engine.state.lock().await.store.schedules().to_vec()
    }

    pub async fn schedule(&self, id: &ScheduleId) -> Option<Schedule> {
        self.engine.state.lock().await.store.get(id).cloned()
    }

    pub async fn has_snapshot(&self) -> bool {
        self.engine.state.lock().await.store.received_snapshot()
    }

    pub async fn pending_stops(&self) -> Vec<ScheduleId> {
        self.engine.state.lock().await.tracker.pending_ids()
    }

    pub async fn process_stats(&self) -> Option<ProcessStats> {
        self.engine.state.lock().await.process_stats.clone()
    }

    pub async fn view(&self) -> View {
        self.engine.state.lock().await.view
    }

    pub async fn set_view(&self, view: View) {
        let changed = {
            let mut state = self.engine.state.lock().await;
            let changed = state.view != view;
            state.view = view;
            changed
        };
        if changed {
            self.engine.notifier.emit(ClientEvent::ViewChanged(view));
        }
    }

    pub async fn issue_create(&self, draft: &ScheduleDraft) -> Result<CreateOutcome, DispatchError> {
        self.dispatcher.issue_create(draft).await
    }

    pub async fn issue_stop(&self, id: &ScheduleId) -> Result<CommandOutcome, DispatchError> {
        self.dispatcher.issue_stop(id).await
    }

    pub async fn issue_delete(&self, id: &ScheduleId) -> Result<CommandOutcome, DispatchError> {
        self.dispatcher.issue_delete(id).await
    }

    pub async fn issue_emergency_stop(&self) -> Result<CommandOutcome, DispatchError> {
        self.dispatcher.issue_emergency_stop().await
    }

    pub async fn request_process_stats(&self) -> Result<(), DispatchError> {
        self.dispatcher.request_process_stats().await
    }
}

impl Drop for ScheduleController {
    fn drop(&mut self) {
        self.event_loop.abort();
        // The supervisor task keeps its own handle on the connection.
        let connection = Arc::clone(&self.connection);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { connection.disconnect().await });
            }
            Err(_) => debug!("no runtime left to close the connection on drop"),
        }
    }
}

fn spawn_event_loop(
    engine: Arc<Engine>,
    mut channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = channel_events.recv().await {
            engine.handle_channel_event(event).await;
        }
        debug!("channel event stream ended");
    })
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
