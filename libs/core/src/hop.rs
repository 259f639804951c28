use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One record of a server having touched a message
///
/// `request_time` is stamped when the request passes through the server,
/// `reply_time` when the reply passes back. Both are Unix nanoseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hop {
    pub source: String,
    #[serde(default)]
    pub request_time: u64,
    #[serde(default)]
    pub reply_time: u64,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub server_id: String,
}

impl Hop {
    /// Create a hop stamped with the current time as its request time
    pub fn new(
        source: impl Into<String>,
        command: impl Into<String>,
        service_id: impl Into<String>,
        server_id: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            request_time: now_nanos(),
            reply_time: 0,
            command: command.into(),
            service_id: service_id.into(),
            server_id: server_id.into(),
        }
    }

    /// Stamp the reply time
    pub fn complete(&mut self) {
        self.reply_time = now_nanos();
    }

    pub fn is_complete(&self) -> bool {
        self.reply_time != 0
    }
}

/// Complete the most recent open hop left by the given server
///
/// Returns false when the trace holds no such hop.
pub fn complete_hop(trace: &mut [Hop], source: &str, server_id: &str) -> bool {
    let open = trace
        .iter_mut()
        .rev()
        .find(|hop| !hop.is_complete() && hop.source == source && hop.server_id == server_id);

    match open {
        Some(hop) => {
            hop.complete();
            true
        }
        None => false,
    }
}

/// Current Unix time in nanoseconds, saturating far in the future
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
