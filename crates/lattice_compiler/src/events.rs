//! Build event notifications for watch-mode consumers.

use serde::{Deserialize, Serialize};

/// One notification emitted during watch mode or a build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildEvent {
    /// A watched file appeared.
    FileAdd(String),
    /// A watched file was removed.
    FileDelete(String),
    /// A watched file's content changed.
    FileUpdate(String),
    /// A watched directory appeared.
    DirAdd(String),
    /// A watched directory was removed.
    DirDelete(String),
    /// A build began.
    BuildStart {
        /// The id of the starting build.
        build_id: u64,
    },
    /// A build finished.
    BuildFinish {
        /// The id of the finished build.
        build_id: u64,
        /// Whether the build reported any error diagnostic.
        has_error: bool,
    },
    /// A human-readable progress message.
    BuildLog(String),
    /// A rebuild was requested but nothing had changed.
    BuildNoChange,
}

/// Identifies one subscription for later removal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SubscriptionId(u64);

/// A list of event subscribers with explicit unsubscribe.
///
/// Subscribers run synchronously on the orchestrating thread, in
/// subscription order. A subscriber must not call back into the emitter.
#[derive(Default)]
pub struct BuildEvents {
    subscribers: Vec<(SubscriptionId, Box<dyn Fn(&BuildEvent) + Send>)>,
    next_id: u64,
}

impl BuildEvents {
    /// Creates an emitter with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and returns its id.
    pub fn subscribe(&mut self, f: impl Fn(&BuildEvent) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(f)));
        id
    }

    /// Removes a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Delivers an event to every subscriber.
    pub fn emit(&self, event: &BuildEvent) {
        for (_, subscriber) in &self.subscribers {
            subscriber(event);
        }
    }
}
