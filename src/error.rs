use thiserror::Error;

use crate::core::TaskId;

pub use anyhow::Error as RuntimeError;

/// Everything that can go wrong while registering, evaluating or reading
/// tasks.
///
/// A failure never poisons the [`Scheduler`](crate::Scheduler). Tasks that
/// were evaluated before the failure keep their cached results, the failing
/// task and everything downstream of it stay unevaluated and can be retried.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The task exists, but it produces a different type than the one it was
    /// read as.
    #[error("Task {id} '{name}' produces `{actual}`, but it was read as `{expected}`")]
    TypeMismatch {
        id: TaskId,
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The id does not name a task in this scheduler.
    #[error("Task {0} is not registered in this scheduler")]
    UnknownTask(TaskId),

    /// The task's own callable returned an error.
    #[error("Task {id} '{name}':\n{source}")]
    Task {
        id: TaskId,
        name: String,
        source: RuntimeError,
    },

    /// The task was reached again while it was still being evaluated.
    #[error("Cycle detected at task {id} '{name}'")]
    Cycle { id: TaskId, name: String },
}

impl SchedulerError {
    /// The task this error is about.
    pub fn task_id(&self) -> TaskId {
        match self {
            SchedulerError::TypeMismatch { id, .. } => *id,
            SchedulerError::UnknownTask(id) => *id,
            SchedulerError::Task { id, .. } => *id,
            SchedulerError::Cycle { id, .. } => *id,
        }
    }
}
