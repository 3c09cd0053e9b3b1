use hub::{app_config, db};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app_config::init_console_subscriber();
    let db = db::DB::new_from_environment().await?;

    let outcome = db::schema::create_schema(&db.pool).await;
    db.close().await;
    match outcome {
        Ok(()) => {
            info!("Database schema setup completed successfully.");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Error setting up database schema");
            Err(e.into())
        }
    }
}
