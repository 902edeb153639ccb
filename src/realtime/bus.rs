//! In-process change bus backed by a `tokio::sync::broadcast` channel.
//!
//! The database listener publishes one [`ChangeEvent`] per requisition row
//! change; every open feed subscription receives its own copy.

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::requisition::Requisition;

/// A change to the requisition collection
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Insert(Arc<Requisition>),
    Update(Arc<Requisition>),
    Delete { id: Uuid },
    /// Events may have been missed (listener reconnected); reload snapshots
    Resync,
}

impl ChangeEvent {
    /// Id of the affected row, if the event concerns a single row
    pub fn id(&self) -> Option<Uuid> {
        match self {
            ChangeEvent::Insert(r) | ChangeEvent::Update(r) => Some(r.id),
            ChangeEvent::Delete { id } => Some(*id),
            ChangeEvent::Resync => None,
        }
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus for requisition changes.
///
/// When a receiver falls more than `capacity` events behind it observes
/// `RecvError::Lagged` and must reload.
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to all current subscribers; dropped silently when there are none
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
