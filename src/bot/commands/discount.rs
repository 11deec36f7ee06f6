//! Pending discount Discord commands - `pending` and `discount`.
//!
//! Manual access to the queue the point-of-sale agent polls, for when a
//! terminal is offline and staff apply or reject a discount by hand.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete},
        core::{pending_discount, store},
        entities::DiscountStatus,
        errors::{Error, Result},
    };
    use std::fmt::Write;

    /// Lists the discounts queued for a store, oldest first.
    #[poise::command(slash_command, prefix_command)]
    pub async fn pending(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Store whose queue to show"]
        #[autocomplete = "autocomplete::autocomplete_store_name"]
        store_name: String,
        #[description = "Only discounts with this status"]
        #[autocomplete = "autocomplete::autocomplete_discount_status"]
        status: Option<String>,
    ) -> Result<()> {
        let db = &ctx.data().database;

        let Some(shop) = store::get_store_by_name(db, &store_name).await? else {
            ctx.say(format!("❌ Store '{store_name}' not found.")).await?;
            return Ok(());
        };
        let status = match status.as_deref().map(str::parse::<DiscountStatus>).transpose() {
            Ok(status) => status,
            Err(e) => {
                ctx.say(format!("❌ {e}")).await?;
                return Ok(());
            }
        };

        let discounts = pending_discount::list_pending(db, shop.id, status).await?;
        if discounts.is_empty() {
            ctx.say(format!("📭 No discounts queued for {}.", shop.name))
                .await?;
            return Ok(());
        }

        let mut text = format!("**Discounts for {}**\n", shop.name);
        for discount in &discounts {
            let _ = write!(
                text,
                "\n#{} {:.2} **{}** (entry #{}, expires {})",
                discount.id,
                discount.discount_amount,
                discount.status,
                discount.ledger_entry_id,
                discount.expires_at.format("%H:%M:%S")
            );
            if let Some(reason) = &discount.error_message {
                let _ = write!(text, " - {reason}");
            }
        }

        ctx.say(text).await?;
        Ok(())
    }

    /// Moves a pending discount to a new status.
    #[poise::command(slash_command, prefix_command)]
    pub async fn discount(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Discount id"] id: i64,
        #[description = "New status"]
        #[autocomplete = "autocomplete::autocomplete_discount_status"]
        status: String,
        #[description = "Failure reason (required for failed)"] reason: Option<String>,
    ) -> Result<()> {
        let db = &ctx.data().database;

        let new_status = match status.parse::<DiscountStatus>() {
            Ok(status) => status,
            Err(e) => {
                ctx.say(format!("❌ {e}")).await?;
                return Ok(());
            }
        };

        match pending_discount::transition(db, id, new_status, reason).await {
            Ok(updated) => {
                ctx.say(format!(
                    "✅ Discount #{} is now **{}** ({:.2})",
                    updated.id, updated.status, updated.discount_amount
                ))
                .await?;
            }
            Err(
                e @ (Error::NotFound { .. }
                | Error::InvalidArgument { .. }
                | Error::InvalidTransition { .. }),
            ) => {
                ctx.say(format!("❌ {e}")).await?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
