//! Error types for the engine.

use thiserror::Error;

use crate::recurrence::RecurrenceError;
use crate::task::{CompletionState, TaskId};

/// Failure reported by a task/section/count store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn task_not_found(id: TaskId) -> Self {
        StoreError::NotFound { kind: "task", id }
    }

    pub fn section_not_found(id: i64) -> Self {
        StoreError::NotFound { kind: "section", id }
    }
}

/// Failure of a lifecycle transition. Nothing is retried; the caller decides.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),

    #[error("cannot {action} task {task_id}: it is {state}")]
    InvalidTransition {
        task_id: TaskId,
        state: CompletionState,
        action: &'static str,
    },
}
