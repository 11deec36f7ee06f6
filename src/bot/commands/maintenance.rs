//! Maintenance Discord commands - `sweep` and `settings`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        core::{expiration, settings as loyalty_settings},
        errors::{Error, Result},
    };

    /// Previews the expiration sweep, or runs it when `apply` is set.
    ///
    /// Shares the run-lock with the scheduled sweep: if one is in progress this
    /// command does nothing.
    #[poise::command(slash_command, prefix_command)]
    pub async fn sweep(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Write the changes instead of previewing them"] apply: Option<bool>,
    ) -> Result<()> {
        let dry_run = !apply.unwrap_or(false);
        let data = ctx.data();

        ctx.defer().await?;
        let Some(result) = data
            .sweep_guard
            .run(&data.database, &data.settings, dry_run)
            .await?
        else {
            ctx.say("⏳ An expiration sweep is already running, try again later.")
                .await?;
            return Ok(());
        };

        ctx.say(expiration::format_sweep_summary(&result)).await?;
        Ok(())
    }

    /// Shows the effective loyalty settings, or stores an override.
    ///
    /// Omitted options keep their current value. The new values apply to every
    /// command and to the scheduled sweep immediately.
    #[poise::command(slash_command, prefix_command)]
    pub async fn settings(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Largest share of a check payable with points, in percent"]
        max_discount_percent: Option<f64>,
        #[description = "Days an earned point stays spendable"] expiry_days: Option<u32>,
        #[description = "Seconds a pending discount stays claimable"]
        pending_discount_expiry_secs: Option<u32>,
        #[description = "Smallest non-zero redemption"] min_redemption_amount: Option<f64>,
    ) -> Result<()> {
        let data = ctx.data();
        let mut current = data.settings.get().await?;

        let changed = max_discount_percent.is_some()
            || expiry_days.is_some()
            || pending_discount_expiry_secs.is_some()
            || min_redemption_amount.is_some();

        if changed {
            current.max_discount_percent = max_discount_percent.unwrap_or(current.max_discount_percent);
            current.expiry_days = expiry_days.unwrap_or(current.expiry_days);
            current.pending_discount_expiry_secs =
                pending_discount_expiry_secs.unwrap_or(current.pending_discount_expiry_secs);
            current.min_redemption_amount =
                min_redemption_amount.unwrap_or(current.min_redemption_amount);

            if let Err(e) = current.validate() {
                ctx.say(format!("❌ {e}")).await?;
                return Ok(());
            }
            loyalty_settings::save_settings(&data.database, &current).await?;
            data.settings.invalidate().await;
        }

        let heading = if changed { "✅ Settings updated" } else { "⚙️ Loyalty settings" };
        ctx.say(format!(
            "**{heading}**\n\
            Max discount: {:.1}%\n\
            Point lifetime: {} days\n\
            Pending discount window: {} s\n\
            Minimum redemption: {:.2}",
            current.max_discount_percent,
            current.expiry_days,
            current.pending_discount_expiry_secs,
            current.min_redemption_amount
        ))
        .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
