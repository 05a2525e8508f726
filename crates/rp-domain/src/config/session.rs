//! `[session]` — session dispatcher tuning.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inbox depth per `(user_id, bot_id)` session before further enqueues
    /// merge into the queued tail instead of growing the queue.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_queue_depth() -> usize {
    4
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
        }
    }
}
