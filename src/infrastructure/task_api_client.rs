use crate::domain::models::TaskRecord;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/tasks";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "dueTime", default, skip_serializing_if = "Option::is_none")]
    pub due_time: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
}

#[async_trait]
pub trait TaskApiClient: Send + Sync {
    async fn list(&self, days: Option<u32>) -> Result<Vec<TaskRecord>, InfraError>;

    async fn create(&self, draft: &TaskDraft) -> Result<TaskRecord, InfraError>;

    async fn replace(&self, task_id: i64, record: &TaskRecord) -> Result<(), InfraError>;

    async fn delete(&self, task_id: i64) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTaskApiClient {
    client: Client,
    base_url: Url,
}

impl Default for ReqwestTaskApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    id: i64,
    category: Option<String>,
}

impl ReqwestTaskApiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: Url::parse(DEFAULT_BASE_URL).expect("valid default task api url"),
        }
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, InfraError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|error| InfraError::InvalidConfig(format!("invalid task api base url: {error}")))?;
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("task api error: http {}", status.as_u16())
        } else {
            format!("task api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Http(message)
    }

    fn collection_endpoint(&self) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Http("task api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("");
        }
        Ok(url)
    }

    fn item_endpoint(&self, task_id: i64) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Http("task api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push(&task_id.to_string());
            segments.push("");
        }
        Ok(url)
    }
}

#[async_trait]
impl TaskApiClient for ReqwestTaskApiClient {
    async fn list(&self, days: Option<u32>) -> Result<Vec<TaskRecord>, InfraError> {
        let mut request = self.client.get(self.base_url.clone());
        if let Some(days) = days {
            request = request.query(&[("days", days)]);
        }

        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Http(format!("network error while listing tasks: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Http(format!("failed reading task list response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            InfraError::Http(format!("invalid task list payload: {error}; body={body}"))
        })
    }

    async fn create(&self, draft: &TaskDraft) -> Result<TaskRecord, InfraError> {
        let endpoint = self.collection_endpoint()?;
        let response = self
            .client
            .post(endpoint)
            .json(draft)
            .send()
            .await
            .map_err(|error| InfraError::Http(format!("network error while creating task: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Http(format!("failed reading task create response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        // The create endpoint answers with the assigned id and server-side
        // category, not the full record.
        let created: CreateTaskResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Http(format!("invalid task create payload: {error}; body={body}"))
        })?;

        Ok(TaskRecord {
            id: created.id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            category: created.category,
            start_date: draft.start_date,
            end_date: draft.end_date,
            due_time: draft.due_time.clone(),
            is_completed: draft.is_completed,
            subtasks: Vec::new(),
        })
    }

    async fn replace(&self, task_id: i64, record: &TaskRecord) -> Result<(), InfraError> {
        let endpoint = self.item_endpoint(task_id)?;
        let response = self
            .client
            .put(endpoint)
            .json(record)
            .send()
            .await
            .map_err(|error| InfraError::Http(format!("network error while updating task: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Http(format!("failed reading task update response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }

    async fn delete(&self, task_id: i64) -> Result<(), InfraError> {
        let endpoint = self.item_endpoint(task_id)?;
        let response = self
            .client
            .delete(endpoint)
            .send()
            .await
            .map_err(|error| InfraError::Http(format!("network error while deleting task: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Http(format!("failed reading task delete response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }
}
