//! Asynchronous server-side jobs.
//!
//! Contextualization endpoints answer a POST with a job descriptor. The job
//! then runs server-side and is polled until it reaches a terminal status.

use crate::api_client::ApiClient;
use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Default delay between two status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle status of a server-side job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Accepted but not picked up yet
    #[serde(rename = "Not started")]
    NotStarted,
    /// Waiting for a worker
    #[serde(rename = "Queued")]
    Queued,
    /// Being processed
    #[serde(rename = "Running")]
    Running,
    /// Being split into sub-tasks
    #[serde(rename = "Distributing")]
    Distributing,
    /// Sub-tasks handed out to workers
    #[serde(rename = "Distributed")]
    Distributed,
    /// Sub-task results being gathered
    #[serde(rename = "Collecting")]
    Collecting,
    /// Finished successfully
    #[serde(rename = "Completed")]
    Completed,
    /// Finished with an error
    #[serde(rename = "Failed")]
    Failed,
}

impl JobStatus {
    /// Whether the job will not change status anymore
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::NotStarted => "Not started",
            JobStatus::Queued => "Queued",
            JobStatus::Running => "Running",
            JobStatus::Distributing => "Distributing",
            JobStatus::Distributed => "Distributed",
            JobStatus::Collecting => "Collecting",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobDescriptor {
    job_id: i64,
    status: JobStatus,
    created_time: Option<i64>,
    start_time: Option<i64>,
    status_time: Option<i64>,
    error_message: Option<String>,
}

/// A job running server-side, refreshed in place while polling
#[derive(Debug, Clone)]
pub struct ContextualizationJob {
    /// Server-assigned job id
    pub job_id: i64,
    /// Last observed status
    pub status: JobStatus,
    /// Creation time in milliseconds since epoch
    pub created_time: Option<i64>,
    /// Start time in milliseconds since epoch
    pub start_time: Option<i64>,
    /// Time of the last status change in milliseconds since epoch
    pub status_time: Option<i64>,
    /// Failure reason reported by the server
    pub error_message: Option<String>,
    job_path: String,
    api: ApiClient,
    raw: Value,
}

impl ContextualizationJob {
    pub(crate) fn from_response(api: ApiClient, job_path: String, json: &Value) -> Result<Self> {
        let descriptor: JobDescriptor = serde_json::from_value(json.clone())?;
        log::debug!("Started job {} at {}", descriptor.job_id, job_path);
        let mut job = Self {
            job_id: descriptor.job_id,
            status: descriptor.status,
            created_time: None,
            start_time: None,
            status_time: None,
            error_message: None,
            job_path,
            api,
            raw: Value::Null,
        };
        job.apply(descriptor, json.clone());
        Ok(job)
    }

    fn apply(&mut self, descriptor: JobDescriptor, raw: Value) {
        self.status = descriptor.status;
        self.created_time = descriptor.created_time.or(self.created_time);
        self.start_time = descriptor.start_time.or(self.start_time);
        self.status_time = descriptor.status_time.or(self.status_time);
        self.error_message = descriptor.error_message;
        self.raw = raw;
    }

    /// Path the job was started at, relative to the project
    pub fn job_path(&self) -> &str {
        &self.job_path
    }

    /// Fetch the current status from the server
    pub async fn update_status(&mut self) -> Result<JobStatus> {
        let path = format!("{}/{}", self.job_path, self.job_id);
        let json: Value = self.api.get(&path, Vec::new()).await?.json()?;
        let descriptor: JobDescriptor = serde_json::from_value(json.clone())?;
        self.apply(descriptor, json);
        Ok(self.status)
    }

    /// Poll until the job is terminal.
    ///
    /// Returns as soon as `timeout` has elapsed even if the job is still
    /// running; a failed job is an error.
    pub async fn wait_for_completion(
        &mut self,
        timeout: Option<Duration>,
        interval: Duration,
    ) -> Result<JobStatus> {
        let started = Instant::now();
        loop {
            self.update_status().await?;
            match self.status {
                JobStatus::Failed => {
                    return Err(Error::job_failed(
                        self.job_id,
                        self.error_message
                            .clone()
                            .unwrap_or_else(|| "unknown error".to_string()),
                    ))
                }
                JobStatus::Completed => return Ok(self.status),
                _ => {}
            }
            if timeout.map_or(false, |t| started.elapsed() >= t) {
                log::debug!("Gave up waiting for job {} in status {}", self.job_id, self.status);
                return Ok(self.status);
            }
            sleep(interval).await;
        }
    }

    /// Wait for completion and return the final job document
    pub async fn result(&mut self) -> Result<Value> {
        if self.status != JobStatus::Completed {
            self.wait_for_completion(None, DEFAULT_POLL_INTERVAL).await?;
        }
        Ok(self.raw.clone())
    }

    /// Last job document received from the server
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Creation time
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_time.and_then(from_millis)
    }

    /// Start time
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_time.and_then(from_millis)
    }

    /// Time of the last status change
    pub fn status_changed_at(&self) -> Option<DateTime<Utc>> {
        self.status_time.and_then(from_millis)
    }
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
