//! Registry notifications.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::tracking::RemoteDescriptor;

use super::registry::TrackerType;

/// Broadcast whenever the set of available trackers changes.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A new in-process tracker was registered.
    NewTracker { ty: TrackerType, name: String },
    /// A remote-tracker descriptor was loaded. The receiver decides
    /// whether to surface or activate it; no factory is registered.
    NewRemoteTracker(RemoteDescriptor),
}

/// Fan-out of [`RegistryEvent`]s to any number of subscribers.
#[derive(Default)]
pub struct EventHub {
    subscribers: Vec<Sender<RegistryEvent>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to every live subscriber, dropping the ones that hung up.
    pub fn publish(&mut self, event: &RegistryEvent) {
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
