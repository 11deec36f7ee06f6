//! Checkout Discord command - `purchase`.
//!
//! Posts a purchase through the balance engine and sends the customer a
//! best-effort notice once the ledger write has committed.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, commands::resolve_customer, handlers::autocomplete},
        core::{
            balance::{self, PostTransaction},
            ledger::TransactionMetadata,
            notify::{TransactionNotice, dispatch_notice},
            store,
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use std::sync::Arc;

    /// Posts a purchase: earns points and optionally redeems some as a discount.
    #[allow(clippy::too_many_arguments)] // One argument per slash command option
    #[poise::command(slash_command, prefix_command)]
    pub async fn purchase(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Card number or Discord user id"] customer: String,
        #[description = "Store the purchase happened at"]
        #[autocomplete = "autocomplete::autocomplete_store_name"]
        store_name: String,
        #[description = "Check total"] check_amount: f64,
        #[description = "Points to credit"] earn: f64,
        #[description = "Points to redeem as a discount"] redeem: Option<f64>,
        #[description = "Cashier name"] cashier: Option<String>,
        #[description = "Receipt number"] receipt: Option<String>,
    ) -> Result<()> {
        let db = &ctx.data().database;

        let Some(member) = resolve_customer(db, &customer).await? else {
            ctx.say(format!("❌ Customer '{customer}' not found.")).await?;
            return Ok(());
        };
        let Some(shop) = store::get_store_by_name(db, &store_name).await? else {
            ctx.say(format!("❌ Store '{store_name}' not found.")).await?;
            return Ok(());
        };

        let metadata = (cashier.is_some() || receipt.is_some()).then(|| TransactionMetadata {
            cashier_name: cashier,
            receipt_number: receipt,
            terminal_id: None,
            payment_method: None,
        });
        let request = PostTransaction {
            customer_id: member.id,
            store_id: shop.id,
            check_amount,
            points_to_redeem: redeem.unwrap_or(0.0),
            points_to_earn: earn,
            metadata,
        };

        let settings = ctx.data().settings.get().await?;
        let result = match balance::post_transaction(db, &settings, request.clone()).await {
            Ok(result) => result,
            Err(
                e @ (Error::NotFound { .. }
                | Error::InvalidArgument { .. }
                | Error::InsufficientBalance { .. }
                | Error::LimitExceeded { .. }),
            ) => {
                ctx.say(format!("❌ {e}")).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        dispatch_notice(
            Arc::clone(&ctx.data().notifier),
            TransactionNotice::new(&member, &shop.name, &request, &result),
        );

        let mut embed = serenity::CreateEmbed::default()
            .title(format!("🧾 Purchase at {}", shop.name))
            .color(0x002E_CC71) // Green color
            .field("Customer", member.display_name(), false)
            .field("Check", format!("{check_amount:.2}"), true)
            .field("Earned", format!("+{earn:.2}"), true)
            .field("New balance", format!("**{:.2}**", result.new_balance), true);

        if let Some(discount_id) = result.pending_discount_id {
            embed = embed
                .field("Redeemed", format!("-{:.2}", request.points_to_redeem), true)
                .field("Pending discount", format!("#{discount_id}"), true);
        }

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
