use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::ProjectSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message")]
pub enum LoadingStatus {
    Pending,
    #[serde(rename = "OK")]
    Ok,
    Failed(String),
    Missing(String),
}

impl LoadingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadingStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub project: ProjectSource,
    pub resource: String,
    pub url: Option<String>,
    pub status: LoadingStatus,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(
        project: ProjectSource,
        resource: &str,
        url: Option<&str>,
        status: LoadingStatus,
    ) -> Self {
        Self {
            project,
            resource: resource.to_string(),
            url: url.map(str::to_string),
            status,
            at: Utc::now(),
        }
    }
}

pub trait StatusSink: Send + Sync {
    fn record(&self, event: StatusEvent);
}

#[derive(Debug, Default)]
pub struct StatusLog {
    events: Mutex<Vec<StatusEvent>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.lock().clone()
    }

    pub fn latest(&self, resource: &str) -> Option<LoadingStatus> {
        self.lock()
            .iter()
            .rev()
            .find(|event| event.resource == resource)
            .map(|event| event.status.clone())
    }

    pub fn reset(&self, project: ProjectSource) {
        self.lock().retain(|event| event.project != project);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StatusEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StatusSink for StatusLog {
    fn record(&self, event: StatusEvent) {
        let url = event.url.as_deref().unwrap_or("-");
        match &event.status {
            LoadingStatus::Pending => {
                tracing::debug!(resource = %event.resource, url, "pending")
            }
            LoadingStatus::Ok => tracing::info!(resource = %event.resource, url, "loaded"),
            LoadingStatus::Failed(message) => {
                tracing::warn!(resource = %event.resource, url, message = %message, "failed")
            }
            LoadingStatus::Missing(reason) => {
                tracing::info!(resource = %event.resource, reason = %reason, "not configured")
            }
        }
        self.lock().push(event);
    }
}

pub struct ResourceLog<'a> {
    sink: &'a dyn StatusSink,
    project: ProjectSource,
    resource: &'a str,
    url: Option<String>,
}

impl<'a> ResourceLog<'a> {
    pub fn new(
        sink: &'a dyn StatusSink,
        project: ProjectSource,
        resource: &'a str,
        url: Option<String>,
    ) -> Self {
        Self {
            sink,
            project,
            resource,
            url,
        }
    }

    pub fn emit(&self, status: LoadingStatus) {
        self.sink.record(StatusEvent::new(
            self.project,
            self.resource,
            self.url.as_deref(),
            status,
        ));
    }
}
