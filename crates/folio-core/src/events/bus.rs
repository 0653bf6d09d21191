//! In-process fan-out of lifecycle events over a tokio broadcast channel.
//!
//! The store emits after a change is persisted and never waits on listeners.
//! A listener that falls behind by more than the channel capacity skips ahead
//! and the gap is recorded in [`EventSubscriber::missed`].

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

use crate::config::DEFAULT_EVENT_CAPACITY;
use crate::events::VersionEvent;

/// Broadcasts [`VersionEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<VersionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// `capacity` is how many events a slow subscriber may fall behind before
    /// it starts missing them. Zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Every event emitted from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
            content_id: None,
            missed: 0,
        }
    }

    /// Only events about one content entity.
    pub fn subscribe_content(&self, content_id: impl Into<String>) -> EventSubscriber {
        EventSubscriber {
            content_id: Some(content_id.into()),
            ..self.subscribe()
        }
    }

    pub fn emit(&self, event: VersionEvent) {
        // Nobody listening is not an error
        let _ = self.sender.send(event);
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end handed out by [`EventBus::subscribe`].
pub struct EventSubscriber {
    receiver: broadcast::Receiver<VersionEvent>,
    content_id: Option<String>,
    missed: u64,
}

impl EventSubscriber {
    /// Wait for the next matching event. `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<VersionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Option<VersionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Events dropped because this subscriber fell behind.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    fn wants(&self, event: &VersionEvent) -> bool {
        self.content_id
            .as_deref()
            .map_or(true, |id| id == event.content_id)
    }

    fn record_lag(&mut self, skipped: u64) {
        self.missed += skipped;
        warn!(skipped, content_id = ?self.content_id, "Event subscriber fell behind");
    }
}
