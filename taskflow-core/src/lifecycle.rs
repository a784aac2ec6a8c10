//! Completion state machine.
//!
//! ```text
//!   Active --complete--> Completed --archive--> Archived
//!     ^                      |
//!     +-----uncomplete-------+
//! ```
//!
//! - `complete` on a repeating task rolls its due date forward instead; the
//!   task stays Active and keeps its section.
//! - `complete` otherwise moves the task into its scope's "Completed" bucket
//!   (created on first use) and marks it done. Move and mark are separate
//!   store calls; a failure between them leaves the task moved but not marked.
//! - `uncomplete` clears the completion flag and date; the task stays in the
//!   Completed bucket.
//! - `archive` sets `totally_completed` and detaches the task from any section
//!   in a single store write.
//!
//! A failed store call aborts the transition, publishes nothing, and is
//! returned to the caller as is.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::errors::{LifecycleError, StoreError};
use crate::events::{EventBus, TaskEvent};
use crate::recurrence::{advance, parse_repeat, Frequency};
use crate::sections::{CompletionScope, SectionResolver};
use crate::store::{SectionStore, TaskStore};
use crate::task::{CompletionState, NewTask, ProjectId, Section, Task, TaskId, TaskPatch, ViewTag};

/// Where the user was looking when they completed the task.
///
/// Supplied by the caller, never re-derived from the task. Scope precedence:
/// Today, Upcoming, the project, then Inbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionContext {
    pub view: Option<ViewTag>,
    pub project_id: Option<ProjectId>,
}

impl CompletionContext {
    pub fn inbox() -> Self {
        Self { view: Some(ViewTag::Inbox), project_id: None }
    }

    pub fn today() -> Self {
        Self { view: Some(ViewTag::Today), project_id: None }
    }

    pub fn upcoming() -> Self {
        Self { view: Some(ViewTag::Upcoming), project_id: None }
    }

    pub fn project(project_id: ProjectId) -> Self {
        Self { view: None, project_id: Some(project_id) }
    }

    pub fn scope(&self) -> CompletionScope {
        match (self.view, self.project_id) {
            (Some(ViewTag::Today), _) => CompletionScope::Today,
            (Some(ViewTag::Upcoming), _) => CompletionScope::Upcoming,
            (_, Some(project_id)) => CompletionScope::Project(project_id),
            _ => CompletionScope::Inbox,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// Repeating task: due date advanced, still Active.
    Rescheduled {
        task: Task,
        frequency: Frequency,
        previous_due: Option<NaiveDate>,
    },
    /// Task parked in the scope's Completed bucket and marked done.
    Completed {
        task: Task,
        section: Section,
        section_created: bool,
    },
}

impl CompletionOutcome {
    pub fn task(&self) -> &Task {
        match self {
            CompletionOutcome::Rescheduled { task, .. }
            | CompletionOutcome::Completed { task, .. } => task,
        }
    }

    /// The caller should reload its view: a brand-new bucket is not rendered yet.
    pub fn needs_refresh(&self) -> bool {
        matches!(self, CompletionOutcome::Completed { section_created: true, .. })
    }
}

pub struct TaskLifecycle<S: ?Sized> {
    store: Arc<S>,
    sections: SectionResolver<S>,
    bus: Arc<EventBus>,
}

impl<S: TaskStore + SectionStore + ?Sized> TaskLifecycle<S> {
    pub fn new(store: Arc<S>, bus: Arc<EventBus>) -> Self {
        Self {
            sections: SectionResolver::new(store.clone()),
            store,
            bus,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Active -> Completed, or a due-date roll for repeating tasks.
    pub async fn complete(
        &self,
        task_id: TaskId,
        context: CompletionContext,
        today: NaiveDate,
    ) -> Result<CompletionOutcome, LifecycleError> {
        let task = self.load(task_id).await?;
        expect_state(&task, CompletionState::Active, "complete")?;

        if let Some(frequency) = parse_repeat(task.repeat.as_deref())? {
            return self.reschedule(task, frequency, today).await;
        }

        let scope = context.scope();
        let resolved = self
            .sections
            .get_or_create_completed_section(scope)
            .await
            .inspect_err(|e| {
                error!(task_id, %scope, error = %e, "resolving Completed section failed")
            })?;

        self.store
            .move_task(task_id, task.project_id, Some(resolved.section.id))
            .await
            .inspect_err(|e| {
                error!(task_id, section_id = resolved.section.id, error = %e, "moving task failed")
            })?;

        let patch = TaskPatch {
            completed: Some(true),
            completed_date: Some(Some(today)),
            ..TaskPatch::default()
        };
        let task = self
            .store
            .update_task(task_id, &patch)
            .await
            .inspect_err(|e| {
                error!(task_id, error = %e, "task moved to Completed but marking it failed")
            })?;

        info!(
            task_id,
            %scope,
            section_id = resolved.section.id,
            created = resolved.created,
            "task completed"
        );
        self.bus.publish(TaskEvent::TaskCompleted {
            task_id,
            completed: true,
            task: task.clone(),
        });

        Ok(CompletionOutcome::Completed {
            task,
            section: resolved.section,
            section_created: resolved.created,
        })
    }

    /// Completed -> Active. The task is left in whatever section it is in.
    pub async fn uncomplete(&self, task_id: TaskId) -> Result<Task, LifecycleError> {
        let task = self.load(task_id).await?;
        expect_state(&task, CompletionState::Completed, "uncomplete")?;

        let patch = TaskPatch {
            completed: Some(false),
            completed_date: Some(None),
            ..TaskPatch::default()
        };
        let task = self
            .store
            .update_task(task_id, &patch)
            .await
            .inspect_err(|e| error!(task_id, error = %e, "undoing completion failed"))?;

        debug!(task_id, section_id = ?task.section_id, "task reopened");
        self.bus.publish(TaskEvent::TaskCompleted {
            task_id,
            completed: false,
            task: task.clone(),
        });
        Ok(task)
    }

    /// Completed -> Archived: into the activity log, out of every section.
    pub async fn archive(&self, task_id: TaskId) -> Result<Task, LifecycleError> {
        let task = self.load(task_id).await?;
        expect_state(&task, CompletionState::Completed, "archive")?;

        // Flag and detach in one write: an Archived task must never keep a section.
        let patch = TaskPatch {
            section_id: Some(None),
            totally_completed: Some(true),
            ..TaskPatch::default()
        };
        let task = self
            .store
            .update_task(task_id, &patch)
            .await
            .inspect_err(|e| error!(task_id, error = %e, "archiving task failed"))?;

        info!(task_id, "task archived");
        self.bus.publish(TaskEvent::TaskUpdated {
            task_id,
            changed_fields: vec!["totally_completed".to_string(), "section_id".to_string()],
            task: task.clone(),
        });
        Ok(task)
    }

    pub async fn create_task(&self, new: &NewTask) -> Result<Task, LifecycleError> {
        let task = self
            .store
            .create_task(new)
            .await
            .inspect_err(|e| error!(name = %new.name, error = %e, "creating task failed"))?;
        self.bus.publish(TaskEvent::TaskCreated { task: task.clone() });
        Ok(task)
    }

    /// Plain field edit. Completion flags go through the transitions above.
    pub async fn update_task(
        &self,
        task_id: TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, LifecycleError> {
        let task = self
            .store
            .update_task(task_id, patch)
            .await
            .inspect_err(|e| error!(task_id, error = %e, "updating task failed"))?;
        self.bus.publish(TaskEvent::TaskUpdated {
            task_id,
            changed_fields: patch.changed_fields(),
            task: task.clone(),
        });
        Ok(task)
    }

    pub async fn delete_task(&self, task_id: TaskId) -> Result<(), LifecycleError> {
        let last_known = match self.store.get_task(task_id).await {
            Ok(task) => Some(task),
            Err(StoreError::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        self.store
            .delete_task(task_id)
            .await
            .inspect_err(|e| error!(task_id, error = %e, "deleting task failed"))?;
        self.bus.publish(TaskEvent::TaskDeleted { task_id, last_known });
        Ok(())
    }

    async fn reschedule(
        &self,
        task: Task,
        frequency: Frequency,
        today: NaiveDate,
    ) -> Result<CompletionOutcome, LifecycleError> {
        let previous_due = task.due_date;
        let next_due = advance(previous_due.unwrap_or(today), frequency)?;
        let patch = TaskPatch {
            due_date: Some(Some(next_due)),
            completed: Some(false),
            ..TaskPatch::default()
        };
        let updated = self
            .store
            .update_task(task.id, &patch)
            .await
            .inspect_err(|e| {
                error!(task_id = task.id, error = %e, "rescheduling repeating task failed")
            })?;

        info!(
            task_id = task.id,
            %frequency,
            ?previous_due,
            %next_due,
            "repeating task rolled forward"
        );
        self.bus.publish(TaskEvent::TaskUpdated {
            task_id: task.id,
            changed_fields: patch.changed_fields(),
            task: updated.clone(),
        });

        Ok(CompletionOutcome::Rescheduled {
            task: updated,
            frequency,
            previous_due,
        })
    }

    async fn load(&self, task_id: TaskId) -> Result<Task, LifecycleError> {
        self.store
            .get_task(task_id)
            .await
            .inspect_err(|e| error!(task_id, error = %e, "loading task failed"))
            .map_err(LifecycleError::from)
    }
}

fn expect_state(
    task: &Task,
    expected: CompletionState,
    action: &'static str,
) -> Result<(), LifecycleError> {
    let state = task.state();
    if state != expected {
        return Err(LifecycleError::InvalidTransition {
            task_id: task.id,
            state,
            action,
        });
    }
    Ok(())
}
