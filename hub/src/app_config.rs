use crate::db::{DBConfig, PoolLimits};
use clap::Parser;
use serde::Serialize;
use std::time::Duration;
use time::macros::format_description;
use tracing_subscriber::{
    fmt::{format::FmtSpan, time::UtcTime},
    EnvFilter,
};

#[derive(Parser, Debug, Clone, Serialize)]
#[command(author, version, about, long_about = None)]
pub struct AppBaseConfig {
    /// Database host
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value = "5432")]
    pub db_port: u16,

    /// Database user
    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD")]
    #[serde(skip_serializing)]
    pub db_password: String,

    /// Database name
    #[arg(long, env = "DB_NAME", default_value = "hub")]
    pub db_name: String,

    /// Upper bound on open connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 25)]
    pub db_max_connections: u32,

    /// Connections kept open while idle
    #[arg(long, env = "DB_MIN_CONNECTIONS", default_value_t = 5)]
    pub db_min_connections: u32,

    /// Connections are recycled after this many seconds
    #[arg(long, env = "DB_MAX_LIFETIME_SECS", default_value_t = 300)]
    pub db_max_lifetime_secs: u64,

    #[arg(long, env = "DB_IDLE_TIMEOUT_SECS", default_value_t = 60)]
    pub db_idle_timeout_secs: u64,

    /// How long a caller waits for a free connection
    #[arg(long, env = "DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 30)]
    pub db_acquire_timeout_secs: u64,
}

impl AppBaseConfig {
    /// Get the database configuration
    pub fn db_config(&self) -> DBConfig {
        DBConfig {
            host: self.db_host.clone(),
            port: self.db_port,
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            dbname: self.db_name.clone(),
            limits: PoolLimits {
                max_connections: self.db_max_connections,
                min_connections: self.db_min_connections,
                max_lifetime: Duration::from_secs(self.db_max_lifetime_secs),
                idle_timeout: Duration::from_secs(self.db_idle_timeout_secs),
                acquire_timeout: Duration::from_secs(self.db_acquire_timeout_secs),
            },
        }
    }
}

pub fn init_console_subscriber() {
    let timer = UtcTime::new(format_description!(
        "[year]-[month]-[day]T[hour repr:24]:[minute]:[second].[subsecond digits:3]Z"
    ));
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(timer)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_level(true)
        .with_ansi(true)
        .with_writer(std::io::stdout)
        .init();
}
