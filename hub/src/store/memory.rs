use super::{JobStore, TerminalStore};
use crate::{
    db::schema::{JobRow, TerminalRow},
    error::{Result, StoreError},
    lifecycle::{JobStatus, TerminalStatus},
    model::{Job, NewJob, NewTerminal, Terminal, RECENT_JOBS_LIMIT},
    payload::{self, Document},
};
use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process store with the same contract as [`super::PgStore`], for tests
/// and local runs without a database.
///
/// Rows are kept in their stored form (encoded payloads) and decoded on the
/// way out, so the codec boundary is exercised exactly as with PostgreSQL.
/// Each operation runs under one write or read lock, which plays the part of
/// the row lock.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

#[derive(Default)]
struct State {
    terminals: HashMap<Uuid, TerminalRow>,
    jobs: HashMap<Uuid, JobRow>,
    last_tick: Option<DateTime<Utc>>,
}

impl State {
    // Store clock: strictly increasing, so creation order is total.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(now);
        now
    }

    fn guarded_job_write(
        &mut self,
        id: Uuid,
        to: JobStatus,
        allowed_from: &[JobStatus],
    ) -> Result<&mut JobRow> {
        let now = self.tick();
        let row = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::job_not_found(id))?;
        if !allowed_from.contains(&row.status) {
            return Err(StoreError::InvalidTransition {
                id,
                from: row.status,
                to,
            });
        }
        row.status = to;
        row.updated_at = now;
        Ok(row)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut rows: Vec<JobRow>) -> Vec<JobRow> {
    rows.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    rows
}

impl TerminalStore for MemoryStore {
    async fn create_terminal(&self, terminal: NewTerminal) -> Result<Terminal> {
        let metadata = payload::encode(terminal.metadata.as_ref())?;
        let mut state = self.state.write().await;
        if state
            .terminals
            .values()
            .any(|t| t.serial_number == terminal.serial_number)
        {
            return Err(StoreError::DuplicateSerial(terminal.serial_number));
        }
        let now = state.tick();
        let row = TerminalRow {
            id: Uuid::new_v4(),
            serial_number: terminal.serial_number,
            status: terminal.status,
            last_seen: now,
            metadata,
            created_at: now,
        };
        state.terminals.insert(row.id, row.clone());
        row.try_into()
    }

    async fn get_terminal(&self, id: Uuid) -> Result<Terminal> {
        let state = self.state.read().await;
        state
            .terminals
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::terminal_not_found(id))?
            .try_into()
    }

    async fn get_terminal_by_serial(&self, serial_number: &str) -> Result<Terminal> {
        let state = self.state.read().await;
        state
            .terminals
            .values()
            .find(|t| t.serial_number == serial_number)
            .cloned()
            .ok_or_else(|| StoreError::terminal_not_found(serial_number))?
            .try_into()
    }

    async fn list_terminals_by_status(&self, status: TerminalStatus) -> Result<Vec<Terminal>> {
        let state = self.state.read().await;
        let mut rows: Vec<TerminalRow> = state
            .terminals
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
        rows.into_iter().map(Terminal::try_from).collect()
    }

    async fn record_heartbeat(&self, id: Uuid, status: TerminalStatus) -> Result<Terminal> {
        let mut state = self.state.write().await;
        let now = state.tick();
        let row = state
            .terminals
            .get_mut(&id)
            .ok_or_else(|| StoreError::terminal_not_found(id))?;
        row.status = status;
        row.last_seen = row.last_seen.max(now);
        row.clone().try_into()
    }
}

impl JobStore for MemoryStore {
    async fn create_job(&self, job: NewJob) -> Result<Job> {
        let payload = payload::encode(job.payload.as_ref())?;
        let mut state = self.state.write().await;
        if !state.terminals.contains_key(&job.terminal_id) {
            return Err(StoreError::UnknownTerminal(job.terminal_id));
        }
        let now = state.tick();
        let row = JobRow {
            id: Uuid::new_v4(),
            terminal_id: job.terminal_id,
            job_type: job.job_type,
            payload,
            status: job.status,
            result: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(row.id, row.clone());
        row.try_into()
    }

    async fn get_job(&self, id: Uuid) -> Result<Job> {
        let state = self.state.read().await;
        state
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::job_not_found(id))?
            .try_into()
    }

    async fn list_jobs_by_terminal(&self, terminal_id: Uuid) -> Result<Vec<Job>> {
        let state = self.state.read().await;
        let rows = state
            .jobs
            .values()
            .filter(|j| j.terminal_id == terminal_id)
            .cloned()
            .collect();
        newest_first(rows).into_iter().map(Job::try_from).collect()
    }

    async fn list_recent_jobs(&self) -> Result<Vec<Job>> {
        let state = self.state.read().await;
        let rows = state.jobs.values().cloned().collect();
        newest_first(rows)
            .into_iter()
            .take(RECENT_JOBS_LIMIT as usize)
            .map(Job::try_from)
            .collect()
    }

    async fn update_job_result(
        &self,
        id: Uuid,
        status: JobStatus,
        result: Option<Document>,
    ) -> Result<Job> {
        let result = payload::encode(result.as_ref())?;
        let mut state = self.state.write().await;
        let row = state.guarded_job_write(id, status, status.result_predecessors())?;
        row.result = result;
        row.clone().try_into()
    }

    async fn update_job_status(&self, id: Uuid, status: JobStatus) -> Result<()> {
        let mut state = self.state.write().await;
        state.guarded_job_write(id, status, status.predecessors())?;
        Ok(())
    }
}
