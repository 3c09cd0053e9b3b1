use clap::Parser;
use hub::{
    app_config::init_console_subscriber,
    pg_notify::{job_status_channel, PgNotifier},
    rpc::HubApiServer,
    Document, Job, JobStatus, JobStore, NewJob, NewTerminal, Terminal,
    TerminalStatus, TerminalStore,
};
use jsonrpsee::{core::async_trait, server::Server, types::ErrorObjectOwned};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, error, info};
use uuid::Uuid;

mod app_env {
    use anyhow::Result;
    use clap::Parser;
    use hub::{app_config, db::DB, PgStore};
    use serde::Serialize;

    #[derive(Parser, Serialize)]
    #[command(author, version, about, long_about = None)]
    pub struct AppConfig {
        #[clap(flatten)]
        pub base_config: app_config::AppBaseConfig,

        #[arg(long, env = "JSON_RPC_PORT", default_value = "3030")]
        pub json_rpc_port: u16,
    }

    pub struct AppEnv {
        pub db: DB,
        pub store: PgStore,
    }

    impl AppEnv {
        pub async fn new(app_config: &AppConfig) -> Result<Self> {
            let db = DB::new(app_config.base_config.db_config()).await?;
            let store = PgStore::new(db.pool.clone());
            Ok(Self { db, store })
        }
    }
}

use app_env::{AppConfig, AppEnv};

async fn log_job_updates(env: Arc<AppEnv>) -> anyhow::Result<()> {
    let notifier = PgNotifier::new(&env.db.pool, job_status_channel()).await?;
    let mut subs = notifier.subscribe();

    tokio::spawn(async move {
        while let Some(change) = subs.recv().await {
            info!(
                job_id = %change.id,
                terminal_id = %change.terminal_id,
                status = %change.status,
                "Job status changed"
            );
        }
    });

    Ok(())
}

/// Convert a store outcome into an RPC reply, logging failures. Caller
/// mistakes are logged at debug, backing-store failures at error.
fn reply<T>(method: &str, outcome: hub::Result<T>) -> Result<T, ErrorObjectOwned> {
    outcome.map_err(|err| {
        if err.is_retryable() {
            error!(method, error = %err, "Store failure");
        } else {
            debug!(method, kind = %err.kind(), error = %err, "Request rejected");
        }
        ErrorObjectOwned::from(err)
    })
}

struct HubApiImpl {
    app_env: Arc<AppEnv>,
}

#[async_trait]
impl HubApiServer for HubApiImpl {
    async fn create_terminal(&self, terminal: NewTerminal) -> Result<Terminal, ErrorObjectOwned> {
        debug!("Registering terminal {}", terminal.serial_number);
        reply(
            "createTerminal",
            self.app_env.store.create_terminal(terminal).await,
        )
    }

    async fn get_terminal(&self, id: Uuid) -> Result<Terminal, ErrorObjectOwned> {
        reply("getTerminal", self.app_env.store.get_terminal(id).await)
    }

    async fn get_terminal_by_serial(
        &self,
        serial_number: String,
    ) -> Result<Terminal, ErrorObjectOwned> {
        reply(
            "getTerminalBySerial",
            self.app_env
                .store
                .get_terminal_by_serial(&serial_number)
                .await,
        )
    }

    async fn list_terminals_by_status(
        &self,
        status: TerminalStatus,
    ) -> Result<Vec<Terminal>, ErrorObjectOwned> {
        reply(
            "listTerminalsByStatus",
            self.app_env.store.list_terminals_by_status(status).await,
        )
    }

    async fn record_heartbeat(
        &self,
        id: Uuid,
        status: TerminalStatus,
    ) -> Result<Terminal, ErrorObjectOwned> {
        reply(
            "recordHeartbeat",
            self.app_env.store.record_heartbeat(id, status).await,
        )
    }

    async fn create_job(&self, job: NewJob) -> Result<Job, ErrorObjectOwned> {
        debug!("Creating {} job for terminal {}", job.job_type, job.terminal_id);
        reply("createJob", self.app_env.store.create_job(job).await)
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, ErrorObjectOwned> {
        reply("getJob", self.app_env.store.get_job(id).await)
    }

    async fn list_jobs_by_terminal(&self, terminal_id: Uuid) -> Result<Vec<Job>, ErrorObjectOwned> {
        reply(
            "listJobsByTerminal",
            self.app_env.store.list_jobs_by_terminal(terminal_id).await,
        )
    }

    async fn list_recent_jobs(&self) -> Result<Vec<Job>, ErrorObjectOwned> {
        reply("listRecentJobs", self.app_env.store.list_recent_jobs().await)
    }

    async fn update_job_status(&self, id: Uuid, status: JobStatus) -> Result<(), ErrorObjectOwned> {
        reply(
            "updateJobStatus",
            self.app_env.store.update_job_status(id, status).await,
        )
    }

    async fn update_job_result(
        &self,
        id: Uuid,
        status: JobStatus,
        result: Option<Document>,
    ) -> Result<Job, ErrorObjectOwned> {
        reply(
            "updateJobResult",
            self.app_env.store.update_job_result(id, status, result).await,
        )
    }

    async fn health_check(&self) -> Result<(), ErrorObjectOwned> {
        reply("healthCheck", self.app_env.store.ping().await)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_console_subscriber();
    let cli = AppConfig::parse();
    debug!("{}", serde_json::to_string_pretty(&cli)?);

    // Define the server address
    let addr = {
        let host = "0.0.0.0";
        let addr = format!("{}:{}", host, cli.json_rpc_port);
        addr.parse::<SocketAddr>()
    }?;

    let app_env = {
        let e = AppEnv::new(&cli).await?;
        Arc::new(e)
    };
    log_job_updates(app_env.clone()).await?;

    // Create the JSON-RPC server
    let server = Server::builder().build(addr).await?;

    let server_addr: SocketAddr = server.local_addr()?;
    info!("JSON-RPC server started at {}", server_addr);

    let api = HubApiImpl {
        app_env: app_env.clone(),
    };

    let handle = server.start(api.into_rpc());

    // Keep the server running until Ctrl+C is pressed
    tokio::signal::ctrl_c().await?;

    handle.stop()?;
    handle.stopped().await;
    app_env.db.close().await;
    info!("JSON-RPC server stopped");

    Ok(())
}
