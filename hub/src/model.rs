use crate::{
    lifecycle::{JobStatus, TerminalStatus},
    payload::Document,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on [`crate::store::JobStore::list_recent_jobs`].
pub const RECENT_JOBS_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminal {
    pub id: Uuid,
    pub serial_number: String,
    pub status: TerminalStatus,
    pub last_seen: DateTime<Utc>,
    pub metadata: Option<Document>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTerminal {
    pub serial_number: String,
    pub status: TerminalStatus,
    #[serde(default)]
    pub metadata: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub terminal_id: Uuid,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: Option<Document>,
    pub status: JobStatus,
    pub result: Option<Document>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub terminal_id: Uuid,
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub payload: Option<Document>,
    #[serde(default = "default_job_status")]
    pub status: JobStatus,
}

fn default_job_status() -> JobStatus {
    JobStatus::Pending
}

impl NewTerminal {
    pub fn new(serial_number: impl Into<String>, status: TerminalStatus) -> Self {
        Self {
            serial_number: serial_number.into(),
            status,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Document) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl NewJob {
    /// A `pending` job with no payload.
    pub fn new(terminal_id: Uuid, job_type: impl Into<String>) -> Self {
        Self {
            terminal_id,
            job_type: job_type.into(),
            payload: None,
            status: JobStatus::Pending,
        }
    }

    pub fn with_payload(mut self, payload: Document) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }
}
