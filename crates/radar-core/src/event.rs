//! Realtime notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{CounterpartId, UserId};

/// One "message inserted" notification from the realtime source
///
/// Delivery is at-least-once, so the same underlying message may arrive
/// more than once. The optional `id` is kept for logging only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessageEvent {
    /// Backend row id of the message, when the source supplies it
    #[serde(default)]
    pub id: Option<String>,
    /// Who sent the message
    pub sender_id: UserId,
    /// Who the message is addressed to
    pub receiver_id: UserId,
    /// Opaque message payload
    #[serde(default)]
    pub content: serde_json::Value,
    /// When the backend created the row
    pub created_at: DateTime<Utc>,
}

impl InboundMessageEvent {
    /// Create an event stamped with the current time and an empty payload
    pub fn new(sender_id: impl Into<UserId>, receiver_id: impl Into<UserId>) -> Self {
        Self {
            id: None,
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            content: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Attach a message id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a payload
    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }

    /// The conversation this event belongs to, seen from the receiver
    pub fn counterpart(&self) -> CounterpartId {
        CounterpartId::from(&self.sender_id)
    }

    /// Check if the event was sent by the given user
    pub fn is_from(&self, user: &UserId) -> bool {
        self.sender_id == *user
    }
}
