//! Persistence contract for terminals and jobs.
//!
//! Both traits return plain entity copies or a classified
//! [`StoreError`](crate::error::StoreError). Every write is a single
//! statement, so dropping a future mid-call never leaves a partial write;
//! callers impose deadlines with `tokio::time::timeout`.

pub mod memory;
pub mod pg;

use crate::{
    error::Result,
    lifecycle::{JobStatus, TerminalStatus},
    model::{Job, NewJob, NewTerminal, Terminal},
    payload::Document,
};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[allow(async_fn_in_trait)]
pub trait TerminalStore {
    /// Register a terminal. The store assigns `id`, `created_at` and
    /// `last_seen`.
    async fn create_terminal(&self, terminal: NewTerminal) -> Result<Terminal>;

    async fn get_terminal(&self, id: Uuid) -> Result<Terminal>;

    async fn get_terminal_by_serial(&self, serial_number: &str) -> Result<Terminal>;

    /// Terminals in `status`, ordered by serial number.
    async fn list_terminals_by_status(&self, status: TerminalStatus) -> Result<Vec<Terminal>>;

    /// Record contact from a terminal. `last_seen` never moves backwards.
    async fn record_heartbeat(&self, id: Uuid, status: TerminalStatus) -> Result<Terminal>;
}

#[allow(async_fn_in_trait)]
pub trait JobStore {
    /// Create a job bound to an existing terminal, with
    /// `created_at == updated_at`.
    async fn create_job(&self, job: NewJob) -> Result<Job>;

    async fn get_job(&self, id: Uuid) -> Result<Job>;

    /// Newest first. Empty when the terminal has no jobs.
    async fn list_jobs_by_terminal(&self, terminal_id: Uuid) -> Result<Vec<Job>>;

    /// The newest [`RECENT_JOBS_LIMIT`](crate::model::RECENT_JOBS_LIMIT)
    /// jobs across all terminals.
    async fn list_recent_jobs(&self) -> Result<Vec<Job>>;

    /// Close a job: set a terminal `status` and its `result` together.
    async fn update_job_result(
        &self,
        id: Uuid,
        status: JobStatus,
        result: Option<Document>,
    ) -> Result<Job>;

    /// Move a job along the state machine without touching its result.
    async fn update_job_status(&self, id: Uuid, status: JobStatus) -> Result<()>;
}
