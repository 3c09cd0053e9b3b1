use crate::{
    error::StoreError,
    lifecycle::{JobStatus, TerminalStatus},
    model::{Job, Terminal},
    payload,
};
use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, PgPool};
use uuid::Uuid;

/// Channel the `jobs` trigger publishes status changes on.
pub const JOB_STATUS_CHANNEL: &str = "job_status_changed";

// Terminals table representation. Structured columns are selected as text
// (`metadata::text`) and decoded when the row becomes a `Terminal`.
#[derive(Debug, Clone, FromRow)]
pub struct TerminalRow {
    pub id: Uuid,
    pub serial_number: String,
    pub status: TerminalStatus,
    pub last_seen: DateTime<Utc>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Jobs table representation
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub terminal_id: Uuid,
    pub job_type: String,
    pub payload: Option<String>,
    pub status: JobStatus,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TerminalRow> for Terminal {
    type Error = StoreError;

    fn try_from(row: TerminalRow) -> Result<Self, Self::Error> {
        Ok(Terminal {
            id: row.id,
            serial_number: row.serial_number,
            status: row.status,
            last_seen: row.last_seen,
            metadata: payload::decode(row.metadata)?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            terminal_id: row.terminal_id,
            job_type: row.job_type,
            payload: payload::decode(row.payload)?,
            status: row.status,
            result: payload::decode(row.result)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Idempotently create enum types, tables, indexes and the status trigger.
pub async fn create_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create ENUM types
    pool.execute(sqlx::query(
        r#"
        DO $$ BEGIN
            IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'terminal_status') THEN
                CREATE TYPE terminal_status AS ENUM (
                    'idle',
                    'running',
                    'offline'
                );
            END IF;
            IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'job_status') THEN
                CREATE TYPE job_status AS ENUM (
                    'pending',
                    'running',
                    'done',
                    'failed'
                );
            END IF;
        END $$;
    "#,
    ))
    .await?;

    // Create Terminals table
    pool.execute(sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS terminals (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            serial_number TEXT NOT NULL UNIQUE,
            status terminal_status NOT NULL,
            last_seen TIMESTAMPTZ NOT NULL DEFAULT now(),
            metadata JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    ))
    .await?;

    // Create Jobs table
    pool.execute(sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            terminal_id UUID NOT NULL REFERENCES terminals (id),
            type TEXT NOT NULL,
            payload JSONB,
            status job_status NOT NULL,
            result JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    ))
    .await?;

    // Create indexes
    pool.execute(sqlx::query(
        r#"
        DO $$ BEGIN
            CREATE INDEX IF NOT EXISTS idx_terminals_status ON terminals (status);
            CREATE INDEX IF NOT EXISTS idx_jobs_terminal_created ON jobs (terminal_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs (created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status);
        END $$;
    "#,
    ))
    .await?;

    // Publish status changes for listeners
    pool.execute(sqlx::query(
        r#"
        CREATE OR REPLACE FUNCTION notify_job_status() RETURNS trigger AS $$
        BEGIN
            PERFORM pg_notify(
                'job_status_changed',
                json_build_object(
                    'id', NEW.id,
                    'terminal_id', NEW.terminal_id,
                    'status', NEW.status
                )::text
            );
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql;
    "#,
    ))
    .await?;

    pool.execute(sqlx::query(
        r#"
        DO $$ BEGIN
            IF NOT EXISTS (SELECT 1 FROM pg_trigger WHERE tgname = 'jobs_notify_status') THEN
                CREATE TRIGGER jobs_notify_status
                    AFTER INSERT OR UPDATE OF status ON jobs
                    FOR EACH ROW EXECUTE FUNCTION notify_job_status();
            END IF;
        END $$;
    "#,
    ))
    .await?;

    Ok(())
}
