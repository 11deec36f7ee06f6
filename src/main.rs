use chrono::Duration;
use dotenvy::dotenv;
use loyalty_ledger::{
    bot, config,
    core::{
        clock::SystemClock,
        settings::{DEFAULT_SETTINGS_TTL_SECS, SettingsCache},
    },
    errors::Result,
    scheduler::{self, SweepGuard},
};
use std::{env, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load and validate the loyalty configuration
    let app_config = config::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    info!(settings = ?app_config.loyalty, "Configuration loaded");

    // 4. Connect to the database and ensure the schema
    let db = config::database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    config::database::create_tables(&db)
        .await
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Shared services
    let settings = Arc::new(SettingsCache::new(
        db.clone(),
        app_config.loyalty.clone(),
        Duration::seconds(DEFAULT_SETTINGS_TTL_SECS),
        Arc::new(SystemClock),
    ));
    let guard = SweepGuard::new();

    // 6. Background expiration sweep
    let worker = tokio::spawn(scheduler::start_sweep_worker(
        db.clone(),
        Arc::clone(&settings),
        guard.clone(),
        app_config.scheduler.clone(),
    ));

    // 7. Operator console, when a token is configured
    match env::var("DISCORD_BOT_TOKEN") {
        Ok(token) => bot::run_bot(token, db, settings, guard).await?,
        Err(_) => {
            warn!("DISCORD_BOT_TOKEN not set, running the expiration scheduler only");
            if let Err(e) = worker.await {
                error!("Sweep worker stopped: {}", e);
            }
        }
    }

    Ok(())
}
