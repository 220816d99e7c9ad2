use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Batch;

/// Frames pushed from the server over the live channel
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once per connection, before the first snapshot
    Welcome { message: String },
    /// Full replacement of the batch table
    BatchUpdate {
        data: Vec<Batch>,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to encode live message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode live message: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ServerMessage {
    pub fn welcome(message: impl Into<String>) -> Self {
        ServerMessage::Welcome {
            message: message.into(),
        }
    }

    /// Snapshot message stamped with the current time
    pub fn batch_update(data: Vec<Batch>) -> Self {
        ServerMessage::BatchUpdate {
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn from_frame(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Decode)
    }
}
