//! taskflow-core: task lifecycle and view classification engine.
//!
//! Pure logic plus the store seams it runs against. Networking lives in
//! `taskflow-sync`.

pub mod counts;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod memory;
pub mod recurrence;
pub mod sections;
pub mod store;
pub mod task;
pub mod time;
pub mod views;

pub use counts::TaskCounts;
pub use errors::{LifecycleError, StoreError};
pub use events::{EventBus, EventKind, SubscriptionId, TaskEvent};
pub use lifecycle::{CompletionContext, CompletionOutcome, TaskLifecycle};
pub use memory::MemoryStore;
pub use recurrence::{advance, next_due_date, parse_repeat, Frequency, RecurrenceError};
pub use sections::{CompletionScope, ResolvedSection, SectionResolver, COMPLETED_SECTION_NAME};
pub use store::{CountSource, ProjectStore, SectionFilter, SectionStore, TaskFilter, TaskStore};
pub use task::{
    CompletionState, NewSection, NewTask, Priority, Project, ProjectId, Section, SectionId, Task,
    TaskId, TaskPatch, ViewTag,
};
pub use time::{
    format_day, parse_day, start_of_week, today_in, today_in_zone, upcoming_window, TimeError,
};
pub use views::{activity_log, classify, filter_view, in_view, View, DEFAULT_WEEK_START};
