use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::reply::Reply;

/// A reply published on a topic to every interested subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub topic: String,
    pub reply: Reply,
}

impl Broadcast {
    pub fn new(topic: impl Into<String>, reply: Reply) -> Self {
        Self {
            topic: topic.into(),
            reply,
        }
    }

    /// Whether a subscriber filtering on `prefix` wants this broadcast
    pub fn matches(&self, prefix: &str) -> bool {
        self.topic.starts_with(prefix)
    }

    /// Only the carried reply is checked; an empty topic reaches every subscriber
    pub fn validate(&self) -> Result<()> {
        self.reply.validate()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let broadcast: Self = serde_json::from_slice(bytes)?;
        broadcast.validate()?;
        Ok(broadcast)
    }
}
