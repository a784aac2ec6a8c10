//! View classification.
//!
//! Membership is recomputed from `due_date` and location every time a task is
//! read; the `current_view` tags stored on the task are only consulted for the
//! explicit Inbox tag.
//!
//! Rules:
//! - no project and no section (or an explicit `inbox` tag on a project-less task) -> Inbox
//! - `due_date == today` -> Today
//! - `due_date` within the two-week upcoming window -> Upcoming
//! - `project_id` set -> Project(id), independent of Today/Upcoming
//! - totally completed -> only the Completed (activity) view

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::task::{ProjectId, Task, ViewTag};
use crate::time::upcoming_window;

/// Locale default used when no week start is configured.
pub const DEFAULT_WEEK_START: Weekday = Weekday::Mon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Inbox,
    Today,
    Upcoming,
    Project(ProjectId),
    /// Activity log of totally completed tasks, keyed by `completed_date`.
    Completed,
}

pub fn classify(task: &Task, today: NaiveDate, week_start: Weekday) -> BTreeSet<View> {
    let mut views = BTreeSet::new();

    if task.totally_completed {
        views.insert(View::Completed);
        return views;
    }

    match task.project_id {
        Some(project_id) => {
            views.insert(View::Project(project_id));
        }
        None => {
            if task.section_id.is_none() || task.has_view_tag(ViewTag::Inbox) {
                views.insert(View::Inbox);
            }
        }
    }

    if let Some(due) = task.due_date {
        if due == today {
            views.insert(View::Today);
        }
        let (start, end) = upcoming_window(today, week_start);
        if (start..=end).contains(&due) {
            views.insert(View::Upcoming);
        }
    }

    views
}

pub fn in_view(task: &Task, view: View, today: NaiveDate, week_start: Weekday) -> bool {
    classify(task, today, week_start).contains(&view)
}

/// Tasks belonging to `view`, in input order.
pub fn filter_view<'a>(
    tasks: &'a [Task],
    view: View,
    today: NaiveDate,
    week_start: Weekday,
) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| in_view(t, view, today, week_start))
        .collect()
}

/// Totally completed tasks grouped by the day they were completed.
/// Tasks without a `completed_date` are grouped under `None`.
pub fn activity_log(tasks: &[Task]) -> BTreeMap<Option<NaiveDate>, Vec<&Task>> {
    let mut out: BTreeMap<Option<NaiveDate>, Vec<&Task>> = BTreeMap::new();
    for t in tasks.iter().filter(|t| t.totally_completed) {
        out.entry(t.completed_date).or_default().push(t);
    }
    out
}
