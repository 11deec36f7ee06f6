//! General Discord commands - ping and help.
//! This module contains simple commands that don't require database operations.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Loyalty Ledger Help**\n\
        Customers are identified by card number or Discord user id.\n\n\
        **Customers**\n\
        • `/balance <customer>` - Cached and available balance, lifetime stats.\n\
        • `/expiring <customer>` - Points expiring in the next 30 days.\n\
        • `/history <customer> [all]` - Ledger entries of the last 45 days (or all).\n\n\
        **Checkout**\n\
        • `/purchase <customer> <store> <check> <earn> [redeem] [cashier] [receipt]` - Posts a purchase.\n\n\
        **Point of sale**\n\
        • `/pending <store> [status]` - Lists discounts queued for a store.\n\
        • `/discount <id> <status> [reason]` - Moves a discount to a new status.\n\n\
        **Maintenance**\n\
        • `/sweep [apply]` - Previews the expiration sweep, or runs it with `apply`.\n\
        • `/settings [...]` - Shows or overrides the loyalty settings.\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
