//! Store seams: the engine talks to persistence only through these traits.
//!
//! Implementations: [`crate::memory::MemoryStore`] in-process, and the REST
//! client in `taskflow-sync`.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::counts::TaskCounts;
use crate::errors::StoreError;
use crate::task::{
    NewSection, NewTask, Priority, ProjectId, Section, SectionId, Task, TaskId, TaskPatch, ViewTag,
};

/// Query for `list_tasks`. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_to: Option<NaiveDate>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if self.project_id.is_some() && task.project_id != self.project_id {
            return false;
        }
        if let Some(tag) = self.view {
            if !task.has_view_tag(tag) {
                return false;
            }
        }
        if let Some(p) = self.priority {
            if task.priority != p {
                return false;
            }
        }
        if self.due_date.is_some() && task.due_date != self.due_date {
            return false;
        }
        if self.due_from.is_some() || self.due_to.is_some() {
            let Some(due) = task.due_date else { return false };
            if self.due_from.is_some_and(|from| due < from) {
                return false;
            }
            if self.due_to.is_some_and(|to| due > to) {
                return false;
            }
        }
        true
    }
}

/// Sections scoped to a project (or to none) and optionally to a view tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionFilter {
    pub project_id: Option<ProjectId>,
    pub view: Option<ViewTag>,
}

impl SectionFilter {
    pub fn matches(&self, section: &Section) -> bool {
        if section.project_id != self.project_id {
            return false;
        }
        match self.view {
            Some(tag) => section.current_view.contains(&tag),
            None => true,
        }
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError>;
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;
    async fn create_task(&self, new: &NewTask) -> Result<Task, StoreError>;
    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError>;
    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError>;

    async fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task, StoreError>;
    async fn set_totally_completed(
        &self,
        id: TaskId,
        totally_completed: bool,
    ) -> Result<Task, StoreError>;

    /// Place a task under `project_id` / `section_id`; `None` detaches.
    async fn move_task(
        &self,
        id: TaskId,
        project_id: Option<ProjectId>,
        section_id: Option<SectionId>,
    ) -> Result<Task, StoreError>;
}

#[async_trait]
pub trait SectionStore: Send + Sync {
    async fn list_sections(&self, filter: &SectionFilter) -> Result<Vec<Section>, StoreError>;
    async fn create_section(&self, new: &NewSection) -> Result<Section, StoreError>;
    async fn rename_section(&self, id: SectionId, name: &str) -> Result<Section, StoreError>;
    async fn delete_section(&self, id: SectionId) -> Result<(), StoreError>;
    async fn section_name_exists(
        &self,
        filter: &SectionFilter,
        name: &str,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn project_name_exists(&self, name: &str) -> Result<bool, StoreError>;
}

/// Source of authoritative count snapshots.
#[async_trait]
pub trait CountSource: Send + Sync {
    /// `today` is the caller's local calendar day.
    async fn fetch_counts(&self, today: NaiveDate) -> Result<TaskCounts, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn task_filter_by_date_range_excludes_undated() {
        let filter = TaskFilter {
            due_from: Some(d(2025, 1, 6)),
            due_to: Some(d(2025, 1, 19)),
            ..TaskFilter::default()
        };
        assert!(filter.matches(&Task::new(1, "a").with_due_date(d(2025, 1, 6))));
        assert!(!filter.matches(&Task::new(2, "b").with_due_date(d(2025, 1, 20))));
        assert!(!filter.matches(&Task::new(3, "c")));
    }

    #[test]
    fn section_filter_is_exact_on_project() {
        let today_bucket = Section {
            id: 1,
            name: "Completed".into(),
            project_id: None,
            current_view: vec![ViewTag::Today],
        };
        let project_bucket = Section {
            id: 2,
            name: "Completed".into(),
            project_id: Some(4),
            current_view: vec![],
        };
        let today = SectionFilter { project_id: None, view: Some(ViewTag::Today) };
        let project = SectionFilter { project_id: Some(4), view: None };

        assert!(today.matches(&today_bucket));
        assert!(!today.matches(&project_bucket));
        assert!(project.matches(&project_bucket));
        assert!(!project.matches(&today_bucket));
    }
}
