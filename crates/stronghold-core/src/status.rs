//! Status enums for Tasks and Peons.

use serde::{Deserialize, Serialize};

/// Status of a Task on the bountyboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task created but not yet picked up by a peon.
    #[default]
    Pending,
    /// Task is being executed by a peon.
    Running,
    /// Task completed successfully.
    Success,
    /// Task failed (retries exhausted or disabled).
    Failure,
    /// Task could not be run (unknown task name, bad payload).
    Invalid,
    /// Task was cancelled before it ran.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failure | Self::Invalid | Self::Cancelled
        )
    }

    /// Returns true if the task may still be cancelled.
    ///
    /// The server only removes tasks that have not been picked up yet.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Status of a Peon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeonStatus {
    /// Peon is idle and polling for work.
    #[default]
    Idle,
    /// Peon claimed a task and is setting up.
    Preparing,
    /// Peon is executing a task.
    Working,
    /// Peon stopped sending heartbeats.
    Offline,
}

impl PeonStatus {
    /// Returns true if the peon can pick up new work.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
        let status: TaskStatus = serde_json::from_str("\"SUCCESS\"").unwrap();
        assert_eq!(status, TaskStatus::Success);
    }

    #[test]
    fn test_task_status_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Invalid.is_terminal());
        assert!(TaskStatus::Pending.is_cancellable());
        assert!(!TaskStatus::Running.is_cancellable());
    }

    #[test]
    fn test_peon_status() {
        let status: PeonStatus = serde_json::from_str("\"PREPARING\"").unwrap();
        assert_eq!(status, PeonStatus::Preparing);
        assert!(PeonStatus::Idle.is_available());
        assert!(!PeonStatus::Offline.is_available());
    }
}
