//! User-facing notifications. A loading notification is later replaced, under
//! the same id, by its success or error resolution.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use crate::ClientEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Loading,
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn is_resolved(&self) -> bool {
        self.level != NotificationLevel::Loading
    }
}

pub(crate) struct Notifier {
    next_id: AtomicU64,
    events: broadcast::Sender<ClientEvent>,
}

impl Notifier {
    pub(crate) fn new(events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            events,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        // Err only means nobody is subscribed right now.
        let _ = self.events.send(event);
    }

    pub(crate) fn allocate(&self) -> NotificationId {
        NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn publish(
        &self,
        id: NotificationId,
        level: NotificationLevel,
        message: impl Into<String>,
    ) {
        self.emit(ClientEvent::Notification(Notification {
            id,
            level,
            message: message.into(),
        }));
    }

    pub(crate) fn show(
        &self,
        level: NotificationLevel,
        message: impl Into<String>,
    ) -> NotificationId {
        let id = self.allocate();
        self.publish(id, level, message);
        id
    }

    pub(crate) fn loading(&self, message: impl Into<String>) -> NotificationId {
        self.show(NotificationLevel::Loading, message)
    }
}
