//! In-process implementation of every store trait.
//!
//! Keeps canonical copies keyed by id (BTreeMap, so listings come back in id
//! order). Used by tests and for offline runs of the engine. Individual
//! operations can be made to fail on demand to exercise error paths.

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

use crate::counts::TaskCounts;
use crate::errors::StoreError;
use crate::store::{CountSource, ProjectStore, SectionFilter, SectionStore, TaskFilter, TaskStore};
use crate::task::{
    NewSection, NewTask, Project, ProjectId, Section, SectionId, Task, TaskId, TaskPatch,
};
use crate::views::DEFAULT_WEEK_START;

#[derive(Debug, Default)]
struct Inner {
    tasks: BTreeMap<TaskId, Task>,
    sections: BTreeMap<SectionId, Section>,
    projects: BTreeMap<ProjectId, Project>,
    next_id: i64,
    failing: HashSet<&'static str>,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn bump_past(&mut self, id: i64) {
        self.next_id = self.next_id.max(id);
    }

    fn check(&self, op: &'static str) -> Result<(), StoreError> {
        if self.failing.contains(op) {
            return Err(StoreError::Backend(format!("injected failure in {op}")));
        }
        Ok(())
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, StoreError> {
        self.tasks.get_mut(&id).ok_or_else(|| StoreError::task_not_found(id))
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    week_start: Weekday,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_week_start(DEFAULT_WEEK_START)
    }

    /// Week start used when computing counts.
    pub fn with_week_start(week_start: Weekday) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            week_start,
        }
    }

    /// Seed a task with a fixed id.
    pub fn insert_task(&self, task: Task) {
        let mut inner = self.inner.lock();
        inner.bump_past(task.id);
        inner.tasks.insert(task.id, task);
    }

    pub fn insert_section(&self, section: Section) {
        let mut inner = self.inner.lock();
        inner.bump_past(section.id);
        inner.sections.insert(section.id, section);
    }

    pub fn insert_project(&self, project: Project) {
        let mut inner = self.inner.lock();
        inner.bump_past(project.id);
        inner.projects.insert(project.id, project);
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.inner.lock().tasks.get(&id).cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.inner.lock().tasks.values().cloned().collect()
    }

    pub fn sections(&self) -> Vec<Section> {
        self.inner.lock().sections.values().cloned().collect()
    }

    /// Make every call of the named operation (e.g. `"move_task"`) fail until cleared.
    pub fn fail_on(&self, op: &'static str) {
        self.inner.lock().failing.insert(op);
    }

    pub fn clear_failures(&self) {
        self.inner.lock().failing.clear();
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        let inner = self.inner.lock();
        inner.check("get_task")?;
        inner.tasks.get(&id).cloned().ok_or_else(|| StoreError::task_not_found(id))
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let inner = self.inner.lock();
        inner.check("list_tasks")?;
        Ok(inner.tasks.values().filter(|t| filter.matches(t)).cloned().collect())
    }

    async fn create_task(&self, new: &NewTask) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        inner.check("create_task")?;
        let id = inner.allocate_id();
        let task = new.clone().into_task(id);
        inner.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        inner.check("update_task")?;
        let task = inner.task_mut(id)?;
        patch.apply(task);
        Ok(task.clone())
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.check("delete_task")?;
        inner.tasks.remove(&id).map(|_| ()).ok_or_else(|| StoreError::task_not_found(id))
    }

    async fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        inner.check("set_completed")?;
        let task = inner.task_mut(id)?;
        task.completed = completed;
        Ok(task.clone())
    }

    async fn set_totally_completed(
        &self,
        id: TaskId,
        totally_completed: bool,
    ) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        inner.check("set_totally_completed")?;
        let task = inner.task_mut(id)?;
        task.totally_completed = totally_completed;
        if totally_completed {
            task.completed = true;
        }
        Ok(task.clone())
    }

    async fn move_task(
        &self,
        id: TaskId,
        project_id: Option<ProjectId>,
        section_id: Option<SectionId>,
    ) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        inner.check("move_task")?;
        if let Some(sid) = section_id {
            if !inner.sections.contains_key(&sid) {
                return Err(StoreError::section_not_found(sid));
            }
        }
        let task = inner.task_mut(id)?;
        task.project_id = project_id;
        task.section_id = section_id;
        Ok(task.clone())
    }
}

#[async_trait]
impl SectionStore for MemoryStore {
    async fn list_sections(&self, filter: &SectionFilter) -> Result<Vec<Section>, StoreError> {
        let inner = self.inner.lock();
        inner.check("list_sections")?;
        Ok(inner.sections.values().filter(|s| filter.matches(s)).cloned().collect())
    }

    async fn create_section(&self, new: &NewSection) -> Result<Section, StoreError> {
        let mut inner = self.inner.lock();
        inner.check("create_section")?;
        let id = inner.allocate_id();
        let section = Section {
            id,
            name: new.name.clone(),
            project_id: new.project_id,
            current_view: new.current_view.clone(),
        };
        inner.sections.insert(id, section.clone());
        Ok(section)
    }

    async fn rename_section(&self, id: SectionId, name: &str) -> Result<Section, StoreError> {
        let mut inner = self.inner.lock();
        inner.check("rename_section")?;
        let section = inner
            .sections
            .get_mut(&id)
            .ok_or_else(|| StoreError::section_not_found(id))?;
        section.name = name.to_string();
        Ok(section.clone())
    }

    async fn delete_section(&self, id: SectionId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.check("delete_section")?;
        inner.sections.remove(&id).ok_or_else(|| StoreError::section_not_found(id))?;
        for task in inner.tasks.values_mut().filter(|t| t.section_id == Some(id)) {
            task.section_id = None;
        }
        Ok(())
    }

    async fn section_name_exists(
        &self,
        filter: &SectionFilter,
        name: &str,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock();
        inner.check("section_name_exists")?;
        Ok(inner.sections.values().any(|s| filter.matches(s) && s.name == name))
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn project_name_exists(&self, name: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock();
        inner.check("project_name_exists")?;
        Ok(inner.projects.values().any(|p| p.name == name))
    }
}

#[async_trait]
impl CountSource for MemoryStore {
    async fn fetch_counts(&self, today: NaiveDate) -> Result<TaskCounts, StoreError> {
        let inner = self.inner.lock();
        inner.check("fetch_counts")?;
        Ok(TaskCounts::from_tasks(inner.tasks.values(), today, self.week_start))
    }
}
