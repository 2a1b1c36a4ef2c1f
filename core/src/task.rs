//! Stateless request builder and response parser for tasks.
//!
//! Tasks have no property list, so updates are a shallow merge of the
//! supplied fields followed by a `PUT` of the whole task.

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::resource::{self, BaseUrl};
use crate::types::{fold_into, Listing, Task};

#[derive(Debug, Clone)]
pub struct TaskClient {
    base: BaseUrl,
}

impl TaskClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: BaseUrl::new(base_url),
        }
    }

    /// Every task, whatever its status.
    pub fn build_list(&self) -> HttpRequest {
        self.base.get("tasks/all")
    }

    /// Tasks not yet completed.
    pub fn build_pending(&self) -> HttpRequest {
        self.base.get("tasks")
    }

    pub fn parse_list(&self, response: HttpResponse) -> Result<Listing<Task>, ApiError> {
        resource::parse_listing(response)
    }

    pub fn build_find(&self, id: i64) -> HttpRequest {
        self.base.get(&format!("tasks/{id}"))
    }

    pub fn parse_find(&self, response: HttpResponse) -> Result<Task, ApiError> {
        resource::parse_found(response)
    }

    pub fn build_create(&self, task: &Task) -> Result<HttpRequest, ApiError> {
        self.base.json(HttpMethod::Post, "tasks", task)
    }

    pub fn parse_create(&self, response: HttpResponse) -> Result<Option<Task>, ApiError> {
        resource::parse_optional(response)
    }

    pub fn build_delete(&self, id: i64) -> HttpRequest {
        self.base.delete(&format!("tasks/{id}"))
    }

    pub fn build_destroy(&self, task: &Task) -> Result<HttpRequest, ApiError> {
        let id = task.id.ok_or(ApiError::MissingId("task"))?;
        Ok(self.build_delete(id))
    }

    /// Fold `options` into `task` locally and build the `PUT` of the result.
    pub fn build_update(&self, task: &mut Task, options: &Map<String, Value>) -> Result<HttpRequest, ApiError> {
        fold_into(task, options.clone())?;
        self.base.json(HttpMethod::Put, "tasks", task)
    }

    pub fn parse_update(&self, task: &mut Task, response: HttpResponse) -> Result<(), ApiError> {
        resource::check_status(&response, 200)?;
        task.merge_body(response.json()?)
    }
}
