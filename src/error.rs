//! Error types for the dayplan core.

use crate::tasks::TaskId;

/// Top-level error type for task view and reminder operations.
#[derive(Debug, thiserror::Error)]
pub enum DayplanError {
    /// User input rejected before anything was written.
    #[error("validation error: {0}")]
    Validation(String),

    /// The user declined notification permission.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The task store subscription or a write failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// No task with the given id exists in the store.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Reminder scheduler error (timer facility, shutdown state).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DayplanError {
    /// Returns `true` for errors caused by the user's own input or choices,
    /// which the UI reports at the point of the action.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::PermissionDenied(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, DayplanError>;
