//! Outbound commands and their notification lifecycles.
//!
//! Create is the only command with a correlated acknowledgement. Stop is
//! resolved later by snapshot reconciliation, delete by a fixed timer, and
//! emergency stop not at all; the server never reports failures for those.

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use shared::{
    domain::ScheduleId,
    protocol::{ClientCommand, CommandAck},
};
use tracing::{info, warn};

use crate::{
    config::ClientSettings,
    confirmation::ConfirmationGate,
    connection::CommandChannel,
    engine::{ControllerState, Engine, View},
    error::{DispatchError, TransportError},
    notifications::{NotificationId, NotificationLevel},
    status_policy::{ScheduleAction, StatusPolicy},
    validation::ScheduleDraft,
    ClientEvent,
};

pub const CREATE_FALLBACK_ERROR: &str = "Could not create the schedule.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Acknowledged; the schedule shows up with the next snapshot.
    Scheduled,
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Sent,
    Declined,
}

pub struct CommandDispatcher {
    channel: Arc<dyn CommandChannel>,
    engine: Arc<Engine>,
    gate: Arc<dyn ConfirmationGate>,
    create_ack_timeout: Duration,
    delete_settle: Duration,
}

impl CommandDispatcher {
    pub(crate) fn new(
        channel: Arc<dyn CommandChannel>,
        engine: Arc<Engine>,
        gate: Arc<dyn ConfirmationGate>,
        settings: &ClientSettings,
    ) -> Self {
        Self {
            channel,
            engine,
            gate,
            create_ack_timeout: settings.create_ack_timeout,
            delete_settle: settings.delete_settle,
        }
    }

    pub async fn issue_create(&self, draft: &ScheduleDraft) -> Result<CreateOutcome, DispatchError> {
        let request = draft.validate()?;
        if self
            .engine
            .create_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DispatchError::CreateInFlight);
        }

        let title = request.title.clone();
        let notifier = &self.engine.notifier;
        let loading = notifier.loading(format!("Sending schedule request for \"{title}\"..."));
        let mut flight = CreateFlight {
            engine: self.engine.as_ref(),
            loading,
            resolved: false,
        };
        let result = self
            .channel
            .emit_with_ack(ClientCommand::CreateSchedule(request), self.create_ack_timeout)
            .await;
        let outcome = create_outcome(result);

        match &outcome {
            CreateOutcome::Scheduled => {
                info!(%title, "schedule created");
                notifier.publish(
                    loading,
                    NotificationLevel::Success,
                    format!("Scheduled \"{title}\""),
                );
                flight.resolved = true;
                self.engine.state.lock().await.view = View::Manage;
                notifier.emit(ClientEvent::ViewChanged(View::Manage));
            }
            CreateOutcome::Failed { message } => {
                warn!(%title, %message, "schedule creation failed");
                notifier.publish(loading, NotificationLevel::Error, message.clone());
                flight.resolved = true;
            }
        }
        Ok(outcome)
    }

    pub async fn issue_stop(&self, id: &ScheduleId) -> Result<CommandOutcome, DispatchError> {
        let title = {
            let state = self.engine.state.lock().await;
            permitted_title(&state, id, ScheduleAction::Stop)?
        };
        if !self
            .gate
            .confirm(&format!("Stop livestream \"{title}\"?"))
            .await
        {
            info!(schedule_id = %id, "stop declined");
            return Ok(CommandOutcome::Declined);
        }

        let notifier = &self.engine.notifier;
        let (notification, already_tracked) = {
            let mut state = self.engine.state.lock().await;
            // Re-checked: a snapshot may have landed while the gate was open.
            permitted_title(&state, id, ScheduleAction::Stop)?;
            let existing = state.tracker.get(id);
            let notification = existing.unwrap_or_else(|| notifier.allocate());
            state.tracker.track(id.clone(), notification);
            notifier.publish(
                notification,
                NotificationLevel::Loading,
                format!("Stopping \"{title}\"..."),
            );
            (notification, existing.is_some())
        };

        if let Err(err) = self
            .channel
            .emit(ClientCommand::StopSchedule { id: id.clone() })
            .await
        {
            let message = format!("Could not send stop request for \"{title}\"");
            if already_tracked {
                // The earlier stop went out and still owns the tracked notification.
                notifier.show(NotificationLevel::Error, message);
            } else {
                self.engine.state.lock().await.tracker.forget(id);
                notifier.publish(notification, NotificationLevel::Error, message);
            }
            return Err(err.into());
        }
        info!(schedule_id = %id, "stop requested");
        Ok(CommandOutcome::Sent)
    }

    pub async fn issue_delete(&self, id: &ScheduleId) -> Result<CommandOutcome, DispatchError> {
        let title = {
            let state = self.engine.state.lock().await;
            permitted_title(&state, id, ScheduleAction::Delete)?
        };
        if !self
            .gate
            .confirm(&format!("Delete schedule \"{title}\"?"))
            .await
        {
            info!(schedule_id = %id, "delete declined");
            return Ok(CommandOutcome::Declined);
        }
        {
            let state = self.engine.state.lock().await;
            permitted_title(&state, id, ScheduleAction::Delete)?;
        }

        let notification = self
            .engine
            .notifier
            .loading(format!("Deleting \"{title}\"..."));
        if let Err(err) = self
            .channel
            .emit(ClientCommand::DeleteSchedule { id: id.clone() })
            .await
        {
            self.engine.notifier.publish(
                notification,
                NotificationLevel::Error,
                format!("Could not delete \"{title}\""),
            );
            return Err(err.into());
        }
        info!(schedule_id = %id, "delete requested");
        self.settle_delete(notification, title);
        Ok(CommandOutcome::Sent)
    }

    pub async fn issue_emergency_stop(&self) -> Result<CommandOutcome, DispatchError> {
        if !self.gate.confirm("Stop ALL active livestreams?").await {
            info!("emergency stop declined");
            return Ok(CommandOutcome::Declined);
        }
        if let Err(err) = self.channel.emit(ClientCommand::EmergencyStopAll).await {
            self.engine
                .notifier
                .show(NotificationLevel::Error, "Could not send emergency stop");
            return Err(err.into());
        }
        warn!("emergency stop requested for all active streams");
        self.engine.notifier.show(
            NotificationLevel::Info,
            "Emergency stop requested for all active streams",
        );
        Ok(CommandOutcome::Sent)
    }

    pub async fn request_process_stats(&self) -> Result<(), DispatchError> {
        self.channel.emit(ClientCommand::GetProcessStats).await?;
        Ok(())
    }

    // The delete is reported done once the settle time passes, whatever the
    // server did with it.
    fn settle_delete(&self, notification: NotificationId, title: String) {
        let engine = Arc::clone(&self.engine);
        let settle = self.delete_settle;
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            engine.notifier.publish(
                notification,
                NotificationLevel::Success,
                format!("Deleted \"{title}\""),
            );
        });
    }
}

/// Holds the create slot until dropped. A create abandoned before its
/// outcome is known resolves its loading notification with the fallback error.
struct CreateFlight<'a> {
    engine: &'a Engine,
    loading: NotificationId,
    resolved: bool,
}

impl Drop for CreateFlight<'_> {
    fn drop(&mut self) {
        self.engine.create_in_flight.store(false, Ordering::Release);
        if !self.resolved {
            warn!("create abandoned before its acknowledgement");
            self.engine.notifier.publish(
                self.loading,
                NotificationLevel::Error,
                CREATE_FALLBACK_ERROR,
            );
        }
    }
}

fn create_outcome(result: Result<CommandAck, TransportError>) -> CreateOutcome {
    match result {
        Ok(ack) if ack.success => CreateOutcome::Scheduled,
        Ok(ack) => CreateOutcome::Failed {
            message: ack
                .error
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| CREATE_FALLBACK_ERROR.to_string()),
        },
        Err(err) => {
            warn!(%err, "create_schedule was not acknowledged");
            CreateOutcome::Failed {
                message: CREATE_FALLBACK_ERROR.to_string(),
            }
        }
    }
}

fn permitted_title(
    state: &ControllerState,
    id: &ScheduleId,
    action: ScheduleAction,
) -> Result<String, DispatchError> {
    let schedule = state
        .store
        .get(id)
        .ok_or_else(|| DispatchError::UnknownSchedule(id.clone()))?;
    if !StatusPolicy::for_status(schedule.status).allows(action) {
        return Err(DispatchError::ActionNotAllowed {
            action,
            id: id.clone(),
            status: schedule.status,
        });
    }
    Ok(schedule.title.clone())
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
