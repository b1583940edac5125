use serde::{Deserialize, Serialize};

/// Anchor of a posted message. Threaded replies reuse `ts` as their `thread_ts`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: String,
    pub ts: String,
}

impl MessageRef {
    pub fn new(channel_id: impl Into<String>, ts: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), ts: ts.into() }
    }
}
