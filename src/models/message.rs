//! Queued row messages as delivered to the catalog writer.

use serde::{Deserialize, Serialize};

/// A row message plus the delivery metadata assigned by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRowMessage {
    /// Channel-assigned message identifier
    pub message_id: String,

    /// Opaque handle used to acknowledge the delivery
    #[serde(default)]
    pub receipt_handle: Option<String>,

    /// Serialized row record
    pub body: String,

    /// How many times this message has been delivered, including this one
    #[serde(default = "first_delivery")]
    pub receive_count: u32,
}

fn first_delivery() -> u32 {
    1
}

impl QueuedRowMessage {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            receipt_handle: None,
            body: body.into(),
            receive_count: first_delivery(),
        }
    }

    pub fn is_redelivery(&self) -> bool {
        self.receive_count > 1
    }
}
