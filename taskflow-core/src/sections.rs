//! "Completed" bucket resolution.
//!
//! Each scope (Inbox, Today, Upcoming, or one project) has at most one section
//! named "Completed", created the first time a task in that scope is
//! completed. Lookup and creation are two separate store calls, so two callers
//! racing on an empty scope can both create one. That duplicate is tolerated:
//! later lookups log it and settle on the lowest id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::store::{SectionFilter, SectionStore};
use crate::task::{NewSection, ProjectId, Section, ViewTag};

pub const COMPLETED_SECTION_NAME: &str = "Completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionScope {
    Inbox,
    Today,
    Upcoming,
    Project(ProjectId),
}

impl CompletionScope {
    pub fn filter(self) -> SectionFilter {
        match self {
            CompletionScope::Inbox => SectionFilter {
                project_id: None,
                view: Some(ViewTag::Inbox),
            },
            CompletionScope::Today => SectionFilter {
                project_id: None,
                view: Some(ViewTag::Today),
            },
            CompletionScope::Upcoming => SectionFilter {
                project_id: None,
                view: Some(ViewTag::Upcoming),
            },
            CompletionScope::Project(id) => SectionFilter {
                project_id: Some(id),
                view: None,
            },
        }
    }

    /// Section payload for this scope's bucket.
    pub fn completed_section(self) -> NewSection {
        let (project_id, current_view) = match self {
            CompletionScope::Inbox => (None, vec![ViewTag::Inbox]),
            CompletionScope::Today => (None, vec![ViewTag::Today]),
            CompletionScope::Upcoming => (None, vec![ViewTag::Upcoming]),
            CompletionScope::Project(id) => (Some(id), Vec::new()),
        };
        NewSection {
            name: COMPLETED_SECTION_NAME.to_string(),
            project_id,
            current_view,
        }
    }
}

impl fmt::Display for CompletionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionScope::Inbox => f.write_str("inbox"),
            CompletionScope::Today => f.write_str("today"),
            CompletionScope::Upcoming => f.write_str("upcoming"),
            CompletionScope::Project(id) => write!(f, "project:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSection {
    pub section: Section,
    /// True when this call created the bucket; already-rendered views won't show it until reloaded.
    pub created: bool,
}

pub struct SectionResolver<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for SectionResolver<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone() }
    }
}

impl<S: SectionStore + ?Sized> SectionResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get_or_create_completed_section(
        &self,
        scope: CompletionScope,
    ) -> Result<ResolvedSection, StoreError> {
        let existing = self.store.list_sections(&scope.filter()).await?;
        let mut buckets: Vec<Section> = existing
            .into_iter()
            .filter(|s| s.name == COMPLETED_SECTION_NAME)
            .collect();
        buckets.sort_by_key(|s| s.id);

        if buckets.len() > 1 {
            let ids: Vec<_> = buckets.iter().map(|s| s.id).collect();
            warn!(%scope, ?ids, "duplicate Completed sections in scope; using lowest id");
        }

        if let Some(section) = buckets.into_iter().next() {
            debug!(%scope, section_id = section.id, "reusing Completed section");
            return Ok(ResolvedSection { section, created: false });
        }

        let section = self.store.create_section(&scope.completed_section()).await?;
        info!(%scope, section_id = section.id, "created Completed section");
        Ok(ResolvedSection { section, created: true })
    }
}
