//! Peon (worker process) types.

use crate::{PeonId, PeonStatus, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Peon as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peon {
    /// Unique peon identifier.
    pub id: PeonId,

    /// Current peon status.
    pub status: PeonStatus,

    /// Last heartbeat received by the server.
    pub last_heartbeat: DateTime<Utc>,

    /// Task currently being worked on, if any.
    #[serde(default)]
    pub current_task_id: Option<TaskId>,

    /// Queues this peon consumes from.
    #[serde(default)]
    pub queues: Vec<String>,
}

impl Peon {
    /// Check if this peon consumes from a given queue.
    pub fn serves_queue(&self, queue: &str) -> bool {
        self.queues.iter().any(|q| q == queue)
    }
}
