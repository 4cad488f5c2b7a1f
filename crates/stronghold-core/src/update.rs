//! Realtime updates pushed by the chieftain endpoint.

use crate::{CoreError, Peon, Task};
use serde::{Deserialize, Serialize};

/// A realtime update, tagged by `kind` on the wire.
///
/// ```json
/// {"kind": "TaskUpdate", "task": { ... }}
/// {"kind": "PeonUpdate", "peon": { ... }}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Update {
    /// Snapshot of a task after a change.
    TaskUpdate { task: Task },
    /// Snapshot of a peon after a change.
    PeonUpdate { peon: Peon },
}

impl Update {
    /// Decode an update from a raw event body.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The task carried by this update, if it is a task update.
    pub fn task(&self) -> Option<&Task> {
        match self {
            Self::TaskUpdate { task } => Some(task),
            Self::PeonUpdate { .. } => None,
        }
    }

    /// The peon carried by this update, if it is a peon update.
    pub fn peon(&self) -> Option<&Peon> {
        match self {
            Self::PeonUpdate { peon } => Some(peon),
            Self::TaskUpdate { .. } => None,
        }
    }
}
