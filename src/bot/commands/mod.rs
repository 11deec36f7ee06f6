//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Member lookup commands
pub mod customer;

/// Pending discount queue commands
pub mod discount;

/// General utility commands
pub mod general;

/// Expiration sweep command
pub mod maintenance;

/// Checkout command
pub mod purchase;

// Export commands
pub use customer::*;
pub use discount::*;
pub use general::*;
pub use maintenance::*;
pub use purchase::*;

use crate::{core::customer as directory, entities::customer as customer_entity, errors::Result};
use sea_orm::DatabaseConnection;

/// Finds a member by card number, falling back to their Discord user id.
pub async fn resolve_customer(
    db: &DatabaseConnection,
    reference: &str,
) -> Result<Option<customer_entity::Model>> {
    if let Some(found) = directory::get_customer_by_card_number(db, reference).await? {
        return Ok(Some(found));
    }
    match reference.trim().parse::<i64>() {
        Ok(chat_id) => directory::get_customer_by_chat_id(db, chat_id).await,
        Err(_) => Ok(None),
    }
}
