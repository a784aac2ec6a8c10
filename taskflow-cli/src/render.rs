//! Plain-text output for the CLI.

use std::fmt::Write;
use taskflow_core::{CompletionOutcome, Task, TaskCounts, View};

pub fn view_label(view: View) -> String {
    match view {
        View::Inbox => "inbox".to_string(),
        View::Today => "today".to_string(),
        View::Upcoming => "upcoming".to_string(),
        View::Project(id) => format!("project {id}"),
        View::Completed => "completed".to_string(),
    }
}

pub fn counts(c: &TaskCounts) -> String {
    let mut out = format!(
        "inbox={} today={} upcoming={} completed={}",
        c.inbox, c.today, c.upcoming, c.completed
    );
    for (project, n) in &c.projects {
        let _ = write!(out, " project[{project}]={n}");
    }
    out
}

pub fn task_line(task: &Task) -> String {
    let due = task
        .due_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("#{} {} (due {due}, {})", task.id, task.name, task.state())
}

pub fn outcome(o: &CompletionOutcome) -> String {
    match o {
        CompletionOutcome::Rescheduled { task, frequency, previous_due } => {
            let prev = previous_due.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string());
            let next = task.due_date.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string());
            format!("#{} repeats {frequency}: due {prev} -> {next}", task.id)
        }
        CompletionOutcome::Completed { task, section, section_created } => {
            let mut line = format!(
                "#{} completed into section {} ({})",
                task.id, section.id, section.name
            );
            if *section_created {
                line.push_str(" [new section, reload views]");
            }
            line
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use taskflow_core::{Frequency, Section};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn counts_list_projects_in_id_order() {
        let c = TaskCounts {
            inbox: 1,
            today: 2,
            upcoming: 3,
            completed: 4,
            projects: BTreeMap::from([(9, 1), (2, 5)]),
        };
        assert_eq!(
            counts(&c),
            "inbox=1 today=2 upcoming=3 completed=4 project[2]=5 project[9]=1"
        );
    }

    #[test]
    fn outcome_lines() {
        let task = Task::new(4, "Rent").with_due_date(day(2025, 2, 28));
        let line = outcome(&CompletionOutcome::Rescheduled {
            task,
            frequency: Frequency::Month,
            previous_due: Some(day(2025, 1, 31)),
        });
        assert_eq!(line, "#4 repeats every month: due 2025-01-31 -> 2025-02-28");

        let mut task = Task::new(5, "Mail");
        task.completed = true;
        let section = Section {
            id: 12,
            name: "Completed".to_string(),
            project_id: None,
            current_view: vec![],
        };
        let line = outcome(&CompletionOutcome::Completed { task, section, section_created: true });
        assert!(line.starts_with("#5 completed into section 12 (Completed)"));
        assert!(line.ends_with("[new section, reload views]"));
    }

    #[test]
    fn labels() {
        assert_eq!(view_label(View::Project(3)), "project 3");
        assert_eq!(view_label(View::Inbox), "inbox");
    }
}
