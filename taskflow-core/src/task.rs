//! Task, section and project model shared by the engine and its stores.
//!
//! The store owns these records; the engine only reads them and asks for
//! mutations through [`crate::store`].

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TaskId = i64;
pub type SectionId = i64;
pub type ProjectId = i64;

/// Default estimate for a new task, in minutes.
pub const DEFAULT_DURATION_MINUTES: u32 = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Urgent,
    Emergency,
}

impl Priority {
    /// 0 is the most pressing. Useful for sorting a view.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Emergency => 0,
            Priority::Urgent => 1,
            Priority::High => 2,
            Priority::Medium => 3,
            Priority::Low => 4,
        }
    }
}

/// View family tag carried by tasks and sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewTag {
    Inbox,
    Today,
    Upcoming,
}

impl ViewTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewTag::Inbox => "inbox",
            ViewTag::Today => "today",
            ViewTag::Upcoming => "upcoming",
        }
    }
}

impl fmt::Display for ViewTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state derived from the `completed` / `totally_completed` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionState {
    Active,
    Completed,
    Archived,
}

impl fmt::Display for CompletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompletionState::Active => "active",
            CompletionState::Completed => "completed",
            CompletionState::Archived => "archived",
        };
        f.write_str(s)
    }
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_MINUTES
}

/// A task as the store reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,

    /// Local calendar day, no time zone attached.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub reminder_date: Option<NaiveDateTime>,
    #[serde(default = "default_duration")]
    pub duration_in_minutes: u32,
    #[serde(default)]
    pub priority: Priority,

    /// Raw repeat string ("every day", "none", ...). Parsed by the recurrence engine.
    #[serde(default)]
    pub repeat: Option<String>,

    /// `None` means the task lives in the Inbox.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub section_id: Option<SectionId>,

    /// Tags assigned at creation. Advisory: view membership is recomputed from `due_date`.
    #[serde(default)]
    pub current_view: Vec<ViewTag>,

    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub totally_completed: bool,

    /// Day the task was marked done; keys the activity log.
    #[serde(default)]
    pub completed_date: Option<NaiveDate>,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            due_date: None,
            reminder_date: None,
            duration_in_minutes: DEFAULT_DURATION_MINUTES,
            priority: Priority::Low,
            repeat: None,
            project_id: None,
            section_id: None,
            current_view: Vec::new(),
            completed: false,
            totally_completed: false,
            completed_date: None,
        }
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_section(mut self, section_id: SectionId) -> Self {
        self.section_id = Some(section_id);
        self
    }

    pub fn with_repeat(mut self, repeat: impl Into<String>) -> Self {
        self.repeat = Some(repeat.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_view_tag(mut self, tag: ViewTag) -> Self {
        if !self.current_view.contains(&tag) {
            self.current_view.push(tag);
        }
        self
    }

    pub fn has_view_tag(&self, tag: ViewTag) -> bool {
        self.current_view.contains(&tag)
    }

    pub fn state(&self) -> CompletionState {
        if self.totally_completed {
            CompletionState::Archived
        } else if self.completed {
            CompletionState::Completed
        } else {
            CompletionState::Active
        }
    }
}

/// Payload for creating a task. The store assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_in_minutes: Option<u32>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<SectionId>,
    #[serde(default)]
    pub current_view: Vec<ViewTag>,
}

impl NewTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Materialize into an Active task with the given id.
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            name: self.name,
            description: self.description,
            due_date: self.due_date,
            reminder_date: self.reminder_date,
            duration_in_minutes: self.duration_in_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            priority: self.priority,
            repeat: self.repeat,
            project_id: self.project_id,
            section_id: self.section_id,
            current_view: self.current_view,
            completed: false,
            totally_completed: false,
            completed_date: None,
        }
    }
}

/// Partial update. `Some(None)` clears a nullable field; `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_date: Option<Option<NaiveDateTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_in_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Option<ProjectId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<Option<SectionId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totally_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Names of the fields this patch touches, in declaration order.
    pub fn changed_fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut mark = |set: bool, name: &str| {
            if set {
                out.push(name.to_string());
            }
        };
        mark(self.name.is_some(), "name");
        mark(self.description.is_some(), "description");
        mark(self.due_date.is_some(), "due_date");
        mark(self.reminder_date.is_some(), "reminder_date");
        mark(self.duration_in_minutes.is_some(), "duration_in_minutes");
        mark(self.priority.is_some(), "priority");
        mark(self.repeat.is_some(), "repeat");
        mark(self.project_id.is_some(), "project_id");
        mark(self.section_id.is_some(), "section_id");
        mark(self.completed.is_some(), "completed");
        mark(self.totally_completed.is_some(), "totally_completed");
        mark(self.completed_date.is_some(), "completed_date");
        out
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(v) = &self.name {
            task.name = v.clone();
        }
        if let Some(v) = &self.description {
            task.description = v.clone();
        }
        if let Some(v) = self.due_date {
            task.due_date = v;
        }
        if let Some(v) = self.reminder_date {
            task.reminder_date = v;
        }
        if let Some(v) = self.duration_in_minutes {
            task.duration_in_minutes = v;
        }
        if let Some(v) = self.priority {
            task.priority = v;
        }
        if let Some(v) = &self.repeat {
            task.repeat = v.clone();
        }
        if let Some(v) = self.project_id {
            task.project_id = v;
        }
        if let Some(v) = self.section_id {
            task.section_id = v;
        }
        if let Some(v) = self.completed {
            task.completed = v;
        }
        if let Some(v) = self.totally_completed {
            task.totally_completed = v;
        }
        if let Some(v) = self.completed_date {
            task.completed_date = v;
        }
    }
}

/// A named grouping of tasks inside a view or project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub current_view: Vec<ViewTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSection {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub current_view: Vec<ViewTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub parent_id: Option<ProjectId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_flags() {
        let mut t = Task::new(1, "write report");
        assert_eq!(t.state(), CompletionState::Active);
        t.completed = true;
        assert_eq!(t.state(), CompletionState::Completed);
        t.totally_completed = true;
        assert_eq!(t.state(), CompletionState::Archived);
    }

    #[test]
    fn deserializes_store_payload_with_defaults() {
        let t: Task = serde_json::from_str(
            r#"{"id": 7, "name": "call mom", "due_date": "2025-01-10", "priority": "urgent",
                "current_view": ["today"], "project_id": null}"#,
        )
        .unwrap();
        assert_eq!(t.duration_in_minutes, 15);
        assert_eq!(t.priority, Priority::Urgent);
        assert_eq!(t.due_date, NaiveDate::from_ymd_opt(2025, 1, 10));
        assert!(t.has_view_tag(ViewTag::Today));
        assert!(!t.completed && !t.totally_completed);
    }

    #[test]
    fn patch_serializes_only_touched_fields_and_nulls_clears() {
        let patch = TaskPatch {
            section_id: Some(None),
            totally_completed: Some(true),
            ..TaskPatch::default()
        };
        let v = serde_json::to_value(&patch).unwrap();
        assert_eq!(v, serde_json::json!({"section_id": null, "totally_completed": true}));
        assert_eq!(patch.changed_fields(), vec!["section_id", "totally_completed"]);

        let mut t = Task::new(1, "x").with_section(4);
        patch.apply(&mut t);
        assert_eq!(t.section_id, None);
        assert!(t.totally_completed);
    }

    #[test]
    fn priority_rank_orders_emergency_first() {
        let mut ps = vec![Priority::Low, Priority::Emergency, Priority::High];
        ps.sort_by_key(|p| p.rank());
        assert_eq!(ps, vec![Priority::Emergency, Priority::High, Priority::Low]);
    }
}
