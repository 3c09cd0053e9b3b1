pub mod schema;

use anyhow::{anyhow, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use url::Url;

#[derive(Clone, Debug)]
pub struct PoolLimits {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_connections: 25,
            min_connections: 5,
            max_lifetime: Duration::from_secs(5 * 60),
            idle_timeout: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DBConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub limits: PoolLimits,
}

impl DBConfig {
    /// Credentials and database name are percent-encoded.
    pub fn connection_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("postgres://{}:{}", self.host, self.port))?;
        url.set_username(&self.user)
            .map_err(|_| anyhow!("cannot set database user on {}", url))?;
        url.set_password(Some(&self.password))
            .map_err(|_| anyhow!("cannot set database password on {}", url))?;
        url.set_path(&self.dbname);
        Ok(url)
    }
}

/// Process-wide connection pool. Opened once at start-up, handed to stores,
/// and closed explicitly at shutdown.
#[derive(Clone)]
pub struct DB {
    pub pool: PgPool,
}

impl DB {
    pub async fn new(config: DBConfig) -> Result<Self> {
        let url = config.connection_url()?;
        let limits = &config.limits;
        let pool = PgPoolOptions::new()
            .max_connections(limits.max_connections)
            .min_connections(limits.min_connections)
            .max_lifetime(limits.max_lifetime)
            .idle_timeout(limits.idle_timeout)
            .acquire_timeout(limits.acquire_timeout)
            .connect(url.as_str())
            .await?;
        tracing::info!(
            host = %config.host,
            db = %config.dbname,
            max_connections = limits.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    pub async fn new_from_environment() -> Result<Self> {
        let db_config = {
            let host = std::env::var("DB_HOST")?;
            let port = std::env::var("DB_PORT")?.parse()?;
            let user = std::env::var("DB_USER")?;
            let password = std::env::var("DB_PASSWORD")?;
            let dbname = std::env::var("DB_NAME")?;
            anyhow::Ok(DBConfig {
                host,
                port,
                user,
                password,
                dbname,
                limits: PoolLimits::default(),
            })
        }?;
        Self::new(db_config).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
