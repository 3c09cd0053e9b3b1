use super::{JobStore, TerminalStore};
use crate::{
    db::schema::{JobRow, TerminalRow},
    error::{Result, StoreError},
    lifecycle::{JobStatus, TerminalStatus},
    model::{Job, NewJob, NewTerminal, Terminal, RECENT_JOBS_LIMIT},
    payload::{self, Document},
};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

// PostgreSQL-backed store; the system of record for terminals and jobs
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    /// Round-trip to the server. A pooled connection alone proves nothing.
    #[instrument(skip(self), level = "debug")]
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Explain why a guarded job write matched no row. The write itself has
    /// already happened (or not); this read only classifies the outcome.
    async fn rejected_write(&self, id: Uuid, to: JobStatus) -> StoreError {
        let current = sqlx::query_scalar::<_, JobStatus>("SELECT status FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        match current {
            Ok(Some(from)) => StoreError::InvalidTransition { id, from, to },
            Ok(None) => StoreError::job_not_found(id),
            Err(err) => StoreError::Persistence(err),
        }
    }
}

fn into_jobs(rows: Vec<JobRow>) -> Result<Vec<Job>> {
    rows.into_iter().map(Job::try_from).collect()
}

fn into_terminals(rows: Vec<TerminalRow>) -> Result<Vec<Terminal>> {
    rows.into_iter().map(Terminal::try_from).collect()
}

impl TerminalStore for PgStore {
    #[instrument(skip_all, fields(serial_number = %terminal.serial_number), level = "debug")]
    async fn create_terminal(&self, terminal: NewTerminal) -> Result<Terminal> {
        let metadata = payload::encode(terminal.metadata.as_ref())?;
        let row: TerminalRow = sqlx::query_as(
            r#"
            INSERT INTO terminals (
                serial_number, status, last_seen, metadata
            ) VALUES (
                $1, $2, now(), $3::jsonb
            )
            RETURNING
                id, serial_number, status, last_seen,
                metadata::text AS metadata, created_at
        "#,
        )
        .bind(&terminal.serial_number)
        .bind(terminal.status)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::on_terminal_insert(e, &terminal.serial_number))?;
        row.try_into()
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_terminal(&self, id: Uuid) -> Result<Terminal> {
        let row: Option<TerminalRow> = sqlx::query_as(
            r#"
            SELECT
                id, serial_number, status, last_seen,
                metadata::text AS metadata, created_at
            FROM terminals
            WHERE id = $1
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| StoreError::terminal_not_found(id))?
            .try_into()
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_terminal_by_serial(&self, serial_number: &str) -> Result<Terminal> {
        let row: Option<TerminalRow> = sqlx::query_as(
            r#"
            SELECT
                id, serial_number, status, last_seen,
                metadata::text AS metadata, created_at
            FROM terminals
            WHERE serial_number = $1
        "#,
        )
        .bind(serial_number)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| StoreError::terminal_not_found(serial_number))?
            .try_into()
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_terminals_by_status(&self, status: TerminalStatus) -> Result<Vec<Terminal>> {
        let rows: Vec<TerminalRow> = sqlx::query_as(
            r#"
            SELECT
                id, serial_number, status, last_seen,
                metadata::text AS metadata, created_at
            FROM terminals
            WHERE status = $1
            ORDER BY serial_number
        "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        into_terminals(rows)
    }

    #[instrument(skip(self), level = "debug")]
    async fn record_heartbeat(&self, id: Uuid, status: TerminalStatus) -> Result<Terminal> {
        let row: Option<TerminalRow> = sqlx::query_as(
            r#"
            UPDATE terminals
            SET
                status = $2,
                last_seen = GREATEST(last_seen, now())
            WHERE id = $1
            RETURNING
                id, serial_number, status, last_seen,
                metadata::text AS metadata, created_at
        "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| StoreError::terminal_not_found(id))?
            .try_into()
    }
}

impl JobStore for PgStore {
    #[instrument(skip_all, fields(terminal_id = %job.terminal_id, job_type = %job.job_type), level = "debug")]
    async fn create_job(&self, job: NewJob) -> Result<Job> {
        let payload = payload::encode(job.payload.as_ref())?;
        let row: JobRow = sqlx::query_as(
            r#"
            INSERT INTO jobs (
                terminal_id, type, payload, status
            ) VALUES (
                $1, $2, $3::jsonb, $4
            )
            RETURNING
                id, terminal_id, type AS job_type, payload::text AS payload,
                status, result::text AS result, created_at, updated_at
        "#,
        )
        .bind(job.terminal_id)
        .bind(&job.job_type)
        .bind(payload)
        .bind(job.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::on_job_insert(e, job.terminal_id))?;
        debug!(job_id = %row.id, status = %row.status, "Job created");
        row.try_into()
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_job(&self, id: Uuid) -> Result<Job> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT
                id, terminal_id, type AS job_type, payload::text AS payload,
                status, result::text AS result, created_at, updated_at
            FROM jobs
            WHERE id = $1
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| StoreError::job_not_found(id))?.try_into()
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_jobs_by_terminal(&self, terminal_id: Uuid) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT
                id, terminal_id, type AS job_type, payload::text AS payload,
                status, result::text AS result, created_at, updated_at
            FROM jobs
            WHERE terminal_id = $1
            ORDER BY created_at DESC, id DESC
        "#,
        )
        .bind(terminal_id)
        .fetch_all(&self.pool)
        .await?;
        into_jobs(rows)
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_recent_jobs(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT
                id, terminal_id, type AS job_type, payload::text AS payload,
                status, result::text AS result, created_at, updated_at
            FROM jobs
            ORDER BY created_at DESC, id DESC
            LIMIT $1
        "#,
        )
        .bind(RECENT_JOBS_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        into_jobs(rows)
    }

    #[instrument(skip(self, result), level = "debug")]
    async fn update_job_result(
        &self,
        id: Uuid,
        status: JobStatus,
        result: Option<Document>,
    ) -> Result<Job> {
        let result = payload::encode(result.as_ref())?;
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET
                status = $2,
                result = $3::jsonb,
                updated_at = GREATEST(updated_at, now())
            WHERE id = $1 AND status = ANY($4)
            RETURNING
                id, terminal_id, type AS job_type, payload::text AS payload,
                status, result::text AS result, created_at, updated_at
        "#,
        )
        .bind(id)
        .bind(status)
        .bind(result)
        .bind(status.result_predecessors())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                debug!(%status, "Job closed");
                row.try_into()
            }
            None => Err(self.rejected_write(id, status).await),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn update_job_status(&self, id: Uuid, status: JobStatus) -> Result<()> {
        let done = sqlx::query(
            r#"
            UPDATE jobs
            SET
                status = $2,
                updated_at = GREATEST(updated_at, now())
            WHERE id = $1 AND status = ANY($3)
        "#,
        )
        .bind(id)
        .bind(status)
        .bind(status.predecessors())
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            return Err(self.rejected_write(id, status).await);
        }
        debug!(%status, "Job status updated");
        Ok(())
    }
}
