//! Task (bountyboard) types.

use crate::{PeonId, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arguments handed to a task's run step and its optional hooks.
///
/// Every field defaults to an empty collection, on the wire and in code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Positional arguments for the run step.
    #[serde(default)]
    pub args: Vec<Value>,

    /// Keyword arguments for the run step.
    #[serde(default)]
    pub kwargs: Map<String, Value>,

    /// Positional arguments for the pre-run hook.
    #[serde(default)]
    pub pre_args: Vec<Value>,

    /// Keyword arguments for the pre-run hook.
    #[serde(default)]
    pub pre_kwargs: Map<String, Value>,

    /// Positional arguments for the post-run hook.
    #[serde(default)]
    pub post_args: Vec<Value>,

    /// Keyword arguments for the post-run hook.
    #[serde(default)]
    pub post_kwargs: Map<String, Value>,
}

impl TaskPayload {
    /// Builder method to add a positional argument for the run step.
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Builder method to add a keyword argument for the run step.
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }
}

/// A Task as stored on the server's bountyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,

    /// Name of the registered task function to run.
    pub task_name: String,

    /// Current task status.
    pub status: TaskStatus,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// When the task was last modified.
    pub updated_at: DateTime<Utc>,

    /// Peon the task is assigned to, if any.
    #[serde(default)]
    pub peon_id: Option<PeonId>,

    /// Queue the task was submitted to.
    pub queue: String,

    /// Run and hook arguments.
    #[serde(default)]
    pub payload: TaskPayload,

    /// Return value of the run step, once finished.
    #[serde(default)]
    pub result: Option<Value>,

    /// Whether failed runs are retried.
    #[serde(default)]
    pub retry_on_failure: bool,

    /// Number of retries performed so far.
    #[serde(default)]
    pub retry_count: u32,

    /// Maximum number of retries.
    #[serde(default)]
    pub retry_limit: u32,
}

impl Task {
    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check if the server would still accept a cancel for this task.
    pub fn is_cancellable(&self) -> bool {
        self.status.is_cancellable()
    }

    /// Check if another retry is still allowed.
    pub fn can_retry(&self) -> bool {
        self.retry_on_failure && self.retry_count < self.retry_limit
    }
}

/// Request body for submitting a new task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTask {
    /// Client-generated identifier.
    pub id: TaskId,

    /// Name of the registered task function to run.
    pub task_name: String,

    /// Queue to submit to.
    pub queue: String,

    /// Whether failed runs are retried.
    pub retry_on_failure: bool,

    /// Maximum number of retries.
    pub retry_limit: u32,

    /// Run and hook arguments.
    pub payload: TaskPayload,
}

impl NewTask {
    /// Default queue name used when none is given.
    pub const DEFAULT_QUEUE: &'static str = "default";

    /// Create a new task submission with default-filled fields.
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            id: TaskId::generate(),
            task_name: task_name.into(),
            queue: Self::DEFAULT_QUEUE.to_string(),
            retry_on_failure: false,
            retry_limit: 0,
            payload: TaskPayload::default(),
        }
    }

    /// Builder method to set the queue.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Builder method to set the payload.
    pub fn with_payload(mut self, payload: TaskPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Builder method to enable retries up to `limit`.
    pub fn with_retries(mut self, limit: u32) -> Self {
        self.retry_on_failure = true;
        self.retry_limit = limit;
        self
    }
}
