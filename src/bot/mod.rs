//! Bot layer - Discord operator console and customer notifications
//!
//! Staff use slash commands to look members up, post purchases, run or preview
//! the expiration sweep and manage pending discounts. Customers receive a
//! direct message after each purchase through [`DiscordNotifier`].

/// Discord command implementations (general, customer, purchase, discount, maintenance)
pub mod commands;
/// Discord interaction handlers (autocomplete, etc.)
pub mod handlers;
/// Direct-message delivery of purchase notices
pub mod notifier;

pub use notifier::DiscordNotifier;

use crate::{
    core::settings::SettingsCache,
    errors::{Error, Result},
    scheduler::SweepGuard,
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands.
/// This structure holds the database connection and the long-lived services
/// that commands need to access.
pub struct BotData {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    /// Effective loyalty settings
    pub settings: Arc<SettingsCache>,
    /// Run-lock shared with the scheduled sweep
    pub sweep_guard: SweepGuard,
    /// Purchase notice delivery
    pub notifier: Arc<DiscordNotifier>,
}

impl BotData {
    /// Creates a new `BotData` instance.
    /// This is called from the framework setup, once the HTTP client the
    /// notifier needs is available.
    #[must_use]
    pub const fn new(
        database: DatabaseConnection,
        settings: Arc<SettingsCache>,
        sweep_guard: SweepGuard,
        notifier: Arc<DiscordNotifier>,
    ) -> Self {
        Self {
            database,
            settings,
            sweep_guard,
            notifier,
        }
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {:?}", ctx.command().name, error);
            if let Err(e) = ctx.say(format!("❌ {error}")).await {
                error!("Failed to send error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Starts the operator console and blocks until the client stops.
#[instrument(skip_all)]
pub async fn run_bot(
    token: String,
    database: DatabaseConnection,
    settings: Arc<SettingsCache>,
    sweep_guard: SweepGuard,
) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::help(),
                commands::balance(),
                commands::expiring(),
                commands::history(),
                commands::purchase(),
                commands::sweep(),
                commands::settings(),
                commands::pending(),
                commands::discount(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                let notifier = Arc::new(DiscordNotifier::new(Arc::clone(&ctx.http)));
                Ok(BotData::new(database, settings, sweep_guard, notifier))
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILD_MESSAGES | serenity::GatewayIntents::DIRECT_MESSAGES;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}
