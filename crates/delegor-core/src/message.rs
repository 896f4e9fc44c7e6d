use crate::task::TaskPriority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recipient name that addresses every worker draining the queue.
pub const BROADCAST: &str = "*";

/// Priority of a coordination message, reusing the task priority scale.
pub type MessagePriority = TaskPriority;

/// A message exchanged between workers within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerMessage {
    /// Unique identifier for this message.
    pub id: Uuid,
    /// Name of the sending worker (or "delegator").
    pub from: String,
    /// Name of the receiving worker, or [`BROADCAST`].
    pub to: String,
    /// Arbitrary JSON payload.
    pub payload: serde_json::Value,
    /// Delivery priority.
    pub priority: MessagePriority,
    /// UTC timestamp of when the message was queued.
    pub sent_at: DateTime<Utc>,
}

impl WorkerMessage {
    /// Creates a new message from one worker to another.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        payload: serde_json::Value,
        priority: MessagePriority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: from.into(),
            to: to.into(),
            payload,
            priority,
            sent_at: Utc::now(),
        }
    }

    /// Whether this message is addressed to the given worker.
    ///
    /// Broadcast messages match any worker.
    pub fn addressed_to(&self, worker: &str) -> bool {
        self.to == worker || self.to == BROADCAST
    }
}
