//! Customer Discord commands - `balance`, `expiring`, and `history`.
//!
//! Read-only views of one member. Balances shown here go through the same
//! reconciliation the checkout uses, so staff see what the next sweep will leave.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, commands::resolve_customer},
        core::{balance, ledger, retention},
        entities::ledger_entry::EntryKind,
        errors::{Error, Result},
    };
    use chrono::Utc;
    use poise::serenity_prelude as serenity;
    use std::fmt::Write;

    /// Entries shown by `/history` before truncating.
    const HISTORY_LINES: usize = 15;

    /// Shows a member's balance, what is about to expire, and lifetime statistics.
    #[poise::command(slash_command, prefix_command)]
    pub async fn balance(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Card number or Discord user id"] customer: String,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let Some(member) = resolve_customer(db, &customer).await? else {
            ctx.say(format!("❌ Customer '{customer}' not found.")).await?;
            return Ok(());
        };

        let settings = ctx.data().settings.get().await?;
        let now = Utc::now();
        let available = balance::available_balance_for(
            db,
            member.id,
            member.current_balance,
            settings.expiry_days,
            now,
        )
        .await?;
        let activity = ledger::activity_summary(
            db,
            member.id,
            retention::statistics_cutoff(now, settings.expiry_days),
        )
        .await?;

        let mut embed = serenity::CreateEmbed::default()
            .title(format!("💳 {}", member.display_name()))
            .color(0x0034_98DB) // Blue color
            .field("Available", format!("**{:.2}**", available.available), true)
            .field("Cached", format!("{:.2}", available.cached_balance), true)
            .field(
                format!("Last {} days", settings.expiry_days),
                format!(
                    "+{:.2} earned / -{:.2} redeemed ({} entries)",
                    activity.earned, activity.redeemed, activity.entries
                ),
                false,
            )
            .field(
                "Lifetime",
                format!(
                    "{} purchases, {:.2} saved",
                    member.total_purchases, member.total_saved
                ),
                false,
            );

        if available.needs_sync {
            embed = embed.footer(serenity::CreateEmbedFooter::new(format!(
                "{:.2} points expired and will be removed at the next sweep",
                available.expired_not_yet_swept
            )));
        }

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Shows how many of a member's points expire soon.
    #[poise::command(slash_command, prefix_command)]
    pub async fn expiring(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Card number or Discord user id"] customer: String,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let Some(member) = resolve_customer(db, &customer).await? else {
            ctx.say(format!("❌ Customer '{customer}' not found.")).await?;
            return Ok(());
        };

        let settings = ctx.data().settings.get().await?;
        let summary =
            ledger::expiring_points_summary(db, member.id, Utc::now(), settings.expiry_days).await?;

        let embed = serenity::CreateEmbed::default()
            .title(format!("⏳ Expiring points: {}", member.display_name()))
            .color(0x00E6_7E22) // Orange color
            .field("Expired, not yet swept", format!("{:.2}", summary.expired_now), false)
            .field("Within 7 days", format!("{:.2}", summary.expiring_in_7_days), true)
            .field("7 to 14 days", format!("{:.2}", summary.expiring_in_14_days), true)
            .field("14 to 30 days", format!("{:.2}", summary.expiring_in_30_days), true);

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Lists a member's ledger entries, newest first.
    #[poise::command(slash_command, prefix_command)]
    pub async fn history(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Card number or Discord user id"] customer: String,
        #[description = "Include entries older than the statistics window"] all: Option<bool>,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let Some(member) = resolve_customer(db, &customer).await? else {
            ctx.say(format!("❌ Customer '{customer}' not found.")).await?;
            return Ok(());
        };

        let settings = ctx.data().settings.get().await?;
        let since = if all.unwrap_or(false) {
            None
        } else {
            Some(retention::statistics_cutoff(Utc::now(), settings.expiry_days))
        };
        let entries = ledger::history_for_customer(db, member.id, since).await?;

        if entries.is_empty() {
            ctx.say(format!("📭 No ledger entries for {}.", member.display_name()))
                .await?;
            return Ok(());
        }

        let mut text = format!("**History of {}**\n", member.display_name());
        for entry in entries.iter().take(HISTORY_LINES) {
            let sign = match entry.kind {
                EntryKind::Earn => '+',
                EntryKind::Spend => '-',
            };
            let _ = write!(
                text,
                "\n`{}` {}{:.2} {} @ {}",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                sign,
                entry.amount,
                entry.title,
                entry.store_name.as_deref().unwrap_or("unknown store")
            );
            if entry.is_expired() {
                text.push_str(" *(expired)*");
            }
        }
        if entries.len() > HISTORY_LINES {
            let _ = write!(text, "\n…and {} more", entries.len() - HISTORY_LINES);
        }

        ctx.say(text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
