//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggests store names and discount statuses so staff do not have to
//! remember exact spellings.

use crate::{bot::BotData, core::store, entities::DiscountStatus, errors::Error};
use sea_orm::Iterable;

/// Provides autocomplete suggestions for store names.
///
/// Returns up to 25 active stores whose name contains the partial input,
/// case-insensitively, in alphabetical order.
pub async fn autocomplete_store_name(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let db = &ctx.data().database;

    let Ok(stores) = store::get_active_stores(db).await else {
        return Vec::new();
    };

    let partial_lower = partial.to_lowercase();
    stores
        .into_iter()
        .filter(|s| s.name.to_lowercase().contains(&partial_lower))
        .map(|s| s.name)
        .take(25) // Discord autocomplete limit
        .collect()
}

/// Provides autocomplete suggestions for discount statuses.
pub async fn autocomplete_discount_status(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let partial_lower = partial.to_lowercase();
    DiscountStatus::iter()
        .map(DiscountStatus::as_str)
        .filter(|status| status.contains(&partial_lower))
        .map(str::to_string)
        .collect()
}
