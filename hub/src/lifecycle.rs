//! Status types and the job state machine.
//!
//! ```text
//! pending --(claim)--> running --(succeed)--> done   [terminal]
//!                        \------(fail)------> failed  [terminal]
//! ```
//!
//! Stores enforce the graph by carrying [`JobStatus::predecessors`] in the
//! `WHERE` clause of every status write, so the legality check and the write
//! happen in one statement.

use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::{fmt, str::FromStr};

// Custom type for TerminalStatus to map to PostgreSQL ENUM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "terminal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Idle,
    Running,
    Offline,
}

// Custom type for JobStatus to map to PostgreSQL ENUM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Done,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// `done` and `failed` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Statuses a job may be in for a write to move it to `self`.
    pub fn predecessors(self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Running => &[JobStatus::Pending],
            JobStatus::Done | JobStatus::Failed => &[JobStatus::Running],
        }
    }

    /// Predecessors for the combined status+result write, which is only
    /// legal into a terminal state.
    pub fn result_predecessors(self) -> &'static [JobStatus] {
        if self.is_terminal() {
            self.predecessors()
        } else {
            &[]
        }
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        next.predecessors().contains(&self)
    }
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Idle => "idle",
            TerminalStatus::Running => "running",
            TerminalStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl FromStr for TerminalStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(TerminalStatus::Idle),
            "running" => Ok(TerminalStatus::Running),
            "offline" => Ok(TerminalStatus::Offline),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
