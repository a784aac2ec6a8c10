//! Aggregate task counts per view and project.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::task::{ProjectId, Task};
use crate::views::{classify, View};

/// Snapshot of how many tasks each view holds.
///
/// Always replaced as a whole; never patch individual fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub inbox: u64,
    pub today: u64,
    pub upcoming: u64,
    pub completed: u64,
    #[serde(default)]
    pub projects: BTreeMap<ProjectId, u64>,
}

impl TaskCounts {
    /// Recompute from source tasks.
    ///
    /// Open tasks count toward the views they classify into; any task marked
    /// `completed` (archived or not) counts toward `completed` only.
    pub fn from_tasks<'a>(
        tasks: impl IntoIterator<Item = &'a Task>,
        today: NaiveDate,
        week_start: Weekday,
    ) -> Self {
        let mut counts = TaskCounts::default();
        for task in tasks {
            if task.completed || task.totally_completed {
                counts.completed += 1;
                continue;
            }
            for view in classify(task, today, week_start) {
                match view {
                    View::Inbox => counts.inbox += 1,
                    View::Today => counts.today += 1,
                    View::Upcoming => counts.upcoming += 1,
                    View::Project(id) => *counts.projects.entry(id).or_default() += 1,
                    View::Completed => {}
                }
            }
        }
        counts
    }

    pub fn project(&self, project_id: ProjectId) -> u64 {
        self.projects.get(&project_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn recomputes_from_tasks() {
        let today = d(2025, 1, 10);
        let mut done = Task::new(4, "done").with_due_date(today);
        done.completed = true;
        let mut archived = Task::new(5, "archived").with_project(2);
        archived.completed = true;
        archived.totally_completed = true;

        let tasks = vec![
            Task::new(1, "inbox today").with_due_date(today),
            Task::new(2, "project next week").with_project(2).with_due_date(d(2025, 1, 15)),
            Task::new(3, "project undated").with_project(3),
            done,
            archived,
        ];

        let counts = TaskCounts::from_tasks(&tasks, today, Weekday::Mon);
        assert_eq!(counts.inbox, 1);
        assert_eq!(counts.today, 1);
        assert_eq!(counts.upcoming, 2);
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.project(2), 1);
        assert_eq!(counts.project(3), 1);
        assert_eq!(counts.project(99), 0);
    }

    #[test]
    fn decodes_wire_snapshot_with_string_project_keys() {
        let counts: TaskCounts = serde_json::from_str(
            r#"{"inbox": 3, "today": 1, "upcoming": 4, "completed": 10, "projects": {"7": 2, "12": 0}}"#,
        )
        .unwrap();
        assert_eq!(counts.project(7), 2);
        assert_eq!(counts.projects.len(), 2);
    }
}
