//! Terminal and job lifecycle layer for a fleet of job-executing terminals.
//!
//! The [`store`] traits are the contract: create terminals, create jobs bound
//! to them, move jobs through `pending → running → done | failed`, and read
//! them back. [`store::PgStore`] is the system of record;
//! [`store::MemoryStore`] honours the same contract in-process.

pub mod app_config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod payload;
pub mod pg_notify;
pub mod rpc;
pub mod store;

pub use error::{ErrorKind, Result, StoreError};
pub use lifecycle::{JobStatus, TerminalStatus};
pub use model::{Job, NewJob, NewTerminal, Terminal, RECENT_JOBS_LIMIT};
pub use payload::Document;
pub use store::{JobStore, MemoryStore, PgStore, TerminalStore};
