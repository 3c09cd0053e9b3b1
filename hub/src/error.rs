use crate::{lifecycle::JobStatus, payload::PayloadError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("terminal with serial number {0} already exists")]
    DuplicateSerial(String),

    #[error("terminal {0} does not exist")]
    UnknownTerminal(Uuid),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] PayloadError),

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

/// Stable classification of a [`StoreError`]; callers branch on this rather
/// than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    DuplicateSerial,
    UnknownTerminal,
    MalformedPayload,
    InvalidTransition,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::DuplicateSerial => "duplicate_serial",
            ErrorKind::UnknownTerminal => "unknown_terminal",
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Persistence => "persistence",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::DuplicateSerial(_) => ErrorKind::DuplicateSerial,
            StoreError::UnknownTerminal(_) => ErrorKind::UnknownTerminal,
            StoreError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            StoreError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            StoreError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Only backing-store failures are worth retrying, with backoff, by the
    /// caller. Nothing is retried inside the stores.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Persistence
    }

    pub(crate) fn terminal_not_found(id: impl ToString) -> Self {
        StoreError::NotFound {
            entity: "terminal",
            id: id.to_string(),
        }
    }

    pub(crate) fn job_not_found(id: Uuid) -> Self {
        StoreError::NotFound {
            entity: "job",
            id: id.to_string(),
        }
    }

    /// Classify an insert failure on `terminals`.
    pub(crate) fn on_terminal_insert(err: sqlx::Error, serial_number: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateSerial(serial_number.to_string())
            }
            _ => StoreError::Persistence(err),
        }
    }

    /// Classify an insert failure on `jobs`.
    pub(crate) fn on_job_insert(err: sqlx::Error, terminal_id: Uuid) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StoreError::UnknownTerminal(terminal_id)
            }
            _ => StoreError::Persistence(err),
        }
    }
}
