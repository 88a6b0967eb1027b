//! Message bus
//!
//! Each collection owns one [`Mailbox`]: an ordered FIFO of messages
//! addressed to instances or to a specific component slot. Posting never
//! dispatches synchronously; the queue is drained once per `post_update`.
//! Messages posted while a drain is in progress land in the next cycle,
//! which bounds message processing to one frame step and rules out
//! unbounded recursion between handlers.

use std::collections::VecDeque;

use crate::foundation::hash::hash_name;
use crate::instance::InstanceKey;

/// Identifier of a message kind, a stable 64-bit hash of its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Identifier for a named message.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        Self(hash_name(name))
    }
}

/// One queued message
#[derive(Debug, Clone)]
pub struct Message {
    /// Addressed instance.
    pub target: InstanceKey,
    /// Slot index within the target, or `None` to broadcast to every slot.
    pub component: Option<usize>,
    /// Message kind.
    pub id: MessageId,
    /// Opaque payload; empty for pure signals.
    pub payload: Vec<u8>,
}

impl Message {
    /// A payload-less message broadcast to every component of the target.
    #[must_use]
    pub fn broadcast(target: InstanceKey, id: MessageId) -> Self {
        Self {
            target,
            component: None,
            id,
            payload: Vec::new(),
        }
    }

    /// A payload-less message for one component slot of the target.
    #[must_use]
    pub fn to_component(target: InstanceKey, slot: usize, id: MessageId) -> Self {
        Self {
            target,
            component: Some(slot),
            id,
            payload: Vec::new(),
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }
}

/// Ordered per-collection message queue
#[derive(Debug, Default)]
pub struct Mailbox {
    queue: VecDeque<Message>,
}

impl Mailbox {
    /// An empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty mailbox with room for `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
        }
    }

    /// Enqueue a message. Never dispatches synchronously.
    pub fn post(&mut self, message: Message) {
        self.queue.push_back(message);
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take the current drain cycle, leaving the mailbox empty.
    ///
    /// Messages posted while the taken batch is being delivered accumulate
    /// in the mailbox for the next cycle.
    pub(crate) fn take_cycle(&mut self) -> VecDeque<Message> {
        std::mem::take(&mut self.queue)
    }

    /// Drop all queued messages.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
