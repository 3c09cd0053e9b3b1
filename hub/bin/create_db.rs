use hub::{app_config, db};
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app_config::init_console_subscriber();
    let db = db::DB::new_from_environment().await?;
    let db_name = env::var("DB_CREATE_NAME")?;
    info!("Creating database '{}'", db_name);

    // Check if database exists
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&db.pool)
            .await?;

    if exists {
        info!("Database '{}' already exists.", db_name);
        db.close().await;
        return Ok(());
    }

    // CREATE DATABASE takes no bind parameters; quote the identifier instead.
    let ident = db_name.replace('"', "\"\"");
    sqlx::query(&format!("CREATE DATABASE \"{}\"", ident))
        .execute(&db.pool)
        .await?;

    info!("Database '{}' created successfully.", db_name);
    db.close().await;

    Ok(())
}
