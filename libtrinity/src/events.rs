//! Publish progress notifications
//!
//! An in-process broadcast bus. Emitting never blocks: with no subscribers
//! the event is dropped, and a lagging subscriber loses the oldest events
//! rather than holding up the publisher.
//!
//! ```no_run
//! use libtrinity::events::{Event, EventBus};
//!
//! # async fn example() {
//! let bus = EventBus::new(64);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(Event::PublishStarted { post_id: 1, platforms: vec![] });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::Platform;

pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A publish invocation acquired the post and read its selection
    PublishStarted {
        post_id: i64,
        platforms: Vec<Platform>,
    },

    /// A target moved to `publishing`
    TargetAttempted { post_id: i64, platform: Platform },

    TargetPublished {
        post_id: i64,
        platform: Platform,
        external_id: String,
    },

    TargetFailed {
        post_id: i64,
        platform: Platform,
        error: String,
    },

    /// The invocation finished; `failed` counts attempted targets that failed
    PublishFinished {
        post_id: i64,
        published: usize,
        failed: usize,
    },
}

impl Event {
    pub fn post_id(&self) -> i64 {
        match self {
            Event::PublishStarted { post_id, .. }
            | Event::TargetAttempted { post_id, .. }
            | Event::TargetPublished { post_id, .. }
            | Event::TargetFailed { post_id, .. }
            | Event::PublishFinished { post_id, .. } => *post_id,
        }
    }
}
