use crate::{
    error::{ErrorKind, StoreError},
    lifecycle::{JobStatus, TerminalStatus},
    model::{Job, NewJob, NewTerminal, Terminal},
    payload::Document,
};
use jsonrpsee::{
    proc_macros::rpc,
    types::{ErrorObject, ErrorObjectOwned},
};
use uuid::Uuid;

#[rpc(server, client)]
pub trait HubApi {
    #[method(name = "createTerminal")]
    async fn create_terminal(&self, terminal: NewTerminal) -> Result<Terminal, ErrorObjectOwned>;

    #[method(name = "getTerminal")]
    async fn get_terminal(&self, id: Uuid) -> Result<Terminal, ErrorObjectOwned>;

    #[method(name = "getTerminalBySerial")]
    async fn get_terminal_by_serial(
        &self,
        serial_number: String,
    ) -> Result<Terminal, ErrorObjectOwned>;

    #[method(name = "listTerminalsByStatus")]
    async fn list_terminals_by_status(
        &self,
        status: TerminalStatus,
    ) -> Result<Vec<Terminal>, ErrorObjectOwned>;

    #[method(name = "recordHeartbeat")]
    async fn record_heartbeat(
        &self,
        id: Uuid,
        status: TerminalStatus,
    ) -> Result<Terminal, ErrorObjectOwned>;

    #[method(name = "createJob")]
    async fn create_job(&self, job: NewJob) -> Result<Job, ErrorObjectOwned>;

    #[method(name = "getJob")]
    async fn get_job(&self, id: Uuid) -> Result<Job, ErrorObjectOwned>;

    #[method(name = "listJobsByTerminal")]
    async fn list_jobs_by_terminal(&self, terminal_id: Uuid) -> Result<Vec<Job>, ErrorObjectOwned>;

    #[method(name = "listRecentJobs")]
    async fn list_recent_jobs(&self) -> Result<Vec<Job>, ErrorObjectOwned>;

    #[method(name = "updateJobStatus")]
    async fn update_job_status(&self, id: Uuid, status: JobStatus) -> Result<(), ErrorObjectOwned>;

    #[method(name = "updateJobResult")]
    async fn update_job_result(
        &self,
        id: Uuid,
        status: JobStatus,
        result: Option<Document>,
    ) -> Result<Job, ErrorObjectOwned>;

    #[method(name = "healthCheck")]
    async fn health_check(&self) -> Result<(), ErrorObjectOwned>;
}

/// JSON-RPC error code for each error kind, in the implementation-defined
/// server error range.
pub fn error_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NotFound => -32004,
        ErrorKind::DuplicateSerial => -32009,
        ErrorKind::UnknownTerminal => -32010,
        ErrorKind::MalformedPayload => -32022,
        ErrorKind::InvalidTransition => -32023,
        ErrorKind::Persistence => -32050,
    }
}

impl From<StoreError> for ErrorObjectOwned {
    fn from(err: StoreError) -> Self {
        let kind = err.kind();
        ErrorObject::owned(error_code(kind), err.to_string(), Some(kind))
    }
}

/// Recover the [`ErrorKind`] a server attached to an error response.
pub fn error_kind(err: &ErrorObjectOwned) -> Option<ErrorKind> {
    err.data()
        .and_then(|raw| serde_json::from_str(raw.get()).ok())
}
