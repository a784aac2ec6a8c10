//! JSON-over-HTTP store client.
//!
//! Implements every store trait against the backend's REST routes. Non-2xx
//! responses become `StoreError::Rejected` (or `NotFound` for a 404 on a
//! specific record); nothing is retried here.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use taskflow_core::time::format_day;
use taskflow_core::{
    CountSource, NewSection, NewTask, ProjectId, ProjectStore, Section, SectionFilter, SectionId,
    SectionStore, StoreError, Task, TaskCounts, TaskFilter, TaskId, TaskPatch, TaskStore,
};
use tracing::debug;

use crate::error::SyncError;

/// Record a 404 should be reported against.
type Subject = Option<(&'static str, i64)>;

#[derive(Debug, Deserialize)]
struct Exists {
    exists: bool,
}

#[derive(Debug, Serialize)]
struct MoveBody {
    project_id: Option<ProjectId>,
    section_id: Option<SectionId>,
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SyncError::InvalidUrl(base_url));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, req: RequestBuilder, subject: Subject) -> Result<Response, StoreError> {
        let resp = req.send().await.map_err(SyncError::from)?;
        let status = resp.status();
        debug!(url = %resp.url(), status = status.as_u16(), "store request");

        if status == StatusCode::NOT_FOUND {
            if let Some((kind, id)) = subject {
                return Err(StoreError::NotFound { kind, id });
            }
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        subject: Subject,
    ) -> Result<T, StoreError> {
        let resp = self.execute(req, subject).await?;
        resp.json::<T>()
            .await
            .map_err(|e| StoreError::Backend(format!("decode response: {e}")))
    }

    fn section_query(filter: &SectionFilter) -> Vec<(&'static str, String)> {
        let mut q = vec![(
            "project_id",
            filter.project_id.map_or_else(|| "null".to_string(), |id| id.to_string()),
        )];
        if let Some(tag) = filter.view {
            q.push(("view", tag.as_str().to_string()));
        }
        q
    }
}

#[async_trait]
impl TaskStore for RestClient {
    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        let req = self.http.get(self.url(&format!("/api/tasks/{id}/")));
        self.json(req, Some(("task", id))).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let req = self.http.get(self.url("/api/tasks/")).query(filter);
        self.json(req, None).await
    }

    async fn create_task(&self, new: &NewTask) -> Result<Task, StoreError> {
        let req = self.http.post(self.url("/api/tasks/")).json(new);
        self.json(req, None).await
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        let req = self.http.patch(self.url(&format!("/api/tasks/{id}/"))).json(patch);
        self.json(req, Some(("task", id))).await
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        let req = self.http.delete(self.url(&format!("/api/tasks/{id}/")));
        self.execute(req, Some(("task", id))).await.map(|_| ())
    }

    async fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task, StoreError> {
        let req = self
            .http
            .patch(self.url(&format!("/api/tasks/{id}/complete/")))
            .json(&json!({ "completed": completed }));
        self.json(req, Some(("task", id))).await
    }

    async fn set_totally_completed(
        &self,
        id: TaskId,
        totally_completed: bool,
    ) -> Result<Task, StoreError> {
        let req = self
            .http
            .patch(self.url(&format!("/api/tasks/{id}/totally-complete/")))
            .json(&json!({ "totally_completed": totally_completed }));
        self.json(req, Some(("task", id))).await
    }

    async fn move_task(
        &self,
        id: TaskId,
        project_id: Option<ProjectId>,
        section_id: Option<SectionId>,
    ) -> Result<Task, StoreError> {
        let req = self
            .http
            .patch(self.url(&format!("/api/tasks/{id}/move/")))
            .json(&MoveBody { project_id, section_id });
        self.json(req, Some(("task", id))).await
    }
}

#[async_trait]
impl SectionStore for RestClient {
    async fn list_sections(&self, filter: &SectionFilter) -> Result<Vec<Section>, StoreError> {
        let req = self.http.get(self.url("/api/sections/")).query(&Self::section_query(filter));
        self.json(req, None).await
    }

    async fn create_section(&self, new: &NewSection) -> Result<Section, StoreError> {
        let req = self.http.post(self.url("/api/sections/")).json(new);
        self.json(req, None).await
    }

    async fn rename_section(&self, id: SectionId, name: &str) -> Result<Section, StoreError> {
        let req = self
            .http
            .patch(self.url(&format!("/api/sections/{id}/")))
            .json(&json!({ "name": name }));
        self.json(req, Some(("section", id))).await
    }

    async fn delete_section(&self, id: SectionId) -> Result<(), StoreError> {
        let req = self.http.delete(self.url(&format!("/api/sections/{id}/")));
        self.execute(req, Some(("section", id))).await.map(|_| ())
    }

    async fn section_name_exists(
        &self,
        filter: &SectionFilter,
        name: &str,
    ) -> Result<bool, StoreError> {
        let mut query = Self::section_query(filter);
        query.push(("name", name.to_string()));
        let req = self.http.get(self.url("/api/sections/exists/")).query(&query);
        let found: Exists = self.json(req, None).await?;
        Ok(found.exists)
    }
}

#[async_trait]
impl ProjectStore for RestClient {
    async fn project_name_exists(&self, name: &str) -> Result<bool, StoreError> {
        let req = self
            .http
            .get(self.url("/api/projects/exists/"))
            .query(&[("name", name)]);
        let found: Exists = self.json(req, None).await?;
        Ok(found.exists)
    }
}

#[async_trait]
impl CountSource for RestClient {
    async fn fetch_counts(&self, today: NaiveDate) -> Result<TaskCounts, StoreError> {
        let req = self
            .http
            .get(self.url("/api/tasks/count/"))
            .query(&[("today", format_day(today))]);
        self.json(req, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_core::ViewTag;

    #[test]
    fn normalizes_base_url() {
        let c = RestClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(c.base_url(), "http://localhost:8000");
        assert_eq!(c.url("/api/tasks/"), "http://localhost:8000/api/tasks/");
        assert!(RestClient::new("localhost:8000", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn section_query_spells_out_missing_project() {
        let q = RestClient::section_query(&SectionFilter {
            project_id: None,
            view: Some(ViewTag::Today),
        });
        assert_eq!(q, vec![("project_id", "null".to_string()), ("view", "today".to_string())]);
        let q = RestClient::section_query(&SectionFilter { project_id: Some(8), view: None });
        assert_eq!(q, vec![("project_id", "8".to_string())]);
    }
}
