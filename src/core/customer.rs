//! Customer directory - lookups and registration of loyalty members.
//!
//! Lookups are read-only. Balance and statistics columns are written only by
//! [`crate::core::balance`] and [`crate::core::expiration`]; [`create_customer`]
//! exists for the registration side and seeds the opening balance.

use crate::{
    entities::{Customer, customer},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};
use tracing::info;

/// Registration data for a new member.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    /// External messaging reference (chat id)
    pub chat_id: i64,
    /// Printed loyalty card number
    pub card_number: Option<String>,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: Option<String>,
    /// Opening balance (welcome bonus)
    pub opening_balance: f64,
}

/// Finds a customer by internal id.
pub async fn get_customer_by_id<C>(db: &C, customer_id: i64) -> Result<Option<customer::Model>>
where
    C: ConnectionTrait,
{
    Customer::find_by_id(customer_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a customer by internal id, failing with `NotFound` when absent.
pub async fn require_customer<C>(db: &C, customer_id: i64) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    get_customer_by_id(db, customer_id)
        .await?
        .ok_or_else(|| Error::not_found("customer", customer_id))
}

/// Finds a customer by the number printed on their loyalty card.
pub async fn get_customer_by_card_number(
    db: &DatabaseConnection,
    card_number: &str,
) -> Result<Option<customer::Model>> {
    Customer::find()
        .filter(customer::Column::CardNumber.eq(card_number.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a customer by their external messaging reference.
pub async fn get_customer_by_chat_id(
    db: &DatabaseConnection,
    chat_id: i64,
) -> Result<Option<customer::Model>> {
    Customer::find()
        .filter(customer::Column::ChatId.eq(chat_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Registers a new member with zeroed statistics.
pub async fn create_customer(db: &DatabaseConnection, new: NewCustomer) -> Result<customer::Model> {
    if new.first_name.trim().is_empty() {
        return Err(Error::invalid("first_name", "cannot be empty"));
    }
    if !new.opening_balance.is_finite() || new.opening_balance < 0.0 {
        return Err(Error::invalid(
            "opening_balance",
            format!("must be a non-negative number, got {}", new.opening_balance),
        ));
    }

    let now = Utc::now();
    let model = customer::ActiveModel {
        chat_id: Set(new.chat_id),
        card_number: Set(new.card_number.map(|c| c.trim().to_string())),
        first_name: Set(new.first_name.trim().to_string()),
        last_name: Set(new.last_name),
        current_balance: Set(new.opening_balance),
        total_purchases: Set(0),
        total_saved: Set(0.0),
        registration_date: Set(now),
        last_activity: Set(now),
        is_active: Set(true),
        ..Default::default()
    };

    let created = model.insert(db).await?;
    info!(customer_id = created.id, chat_id = created.chat_id, "Customer registered");
    Ok(created)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::PaginatorTrait;

    #[tokio::test]
    async fn test_create_customer_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_customer(
            &db,
            NewCustomer {
                chat_id: 1,
                card_number: None,
                first_name: "   ".to_string(),
                last_name: None,
                opening_balance: 0.0,
            },
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidArgument { field: "first_name", .. }
        ));

        let result = create_customer(
            &db,
            NewCustomer {
                chat_id: 1,
                card_number: None,
                first_name: "Maria".to_string(),
                last_name: None,
                opening_balance: f64::NAN,
            },
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidArgument { field: "opening_balance", .. }
        ));
        assert_eq!(Customer::find().count(&db).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_by_all_references() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_custom_customer(&db, 777, Some("421856"), 500.0).await?;

        assert_eq!(created.current_balance, 500.0);
        assert_eq!(created.total_purchases, 0);
        assert_eq!(created.total_saved, 0.0);

        let by_id = get_customer_by_id(&db, created.id).await?.unwrap();
        assert_eq!(by_id, created);

        let by_card = get_customer_by_card_number(&db, " 421856 ").await?.unwrap();
        assert_eq!(by_card.id, created.id);

        let by_chat = get_customer_by_chat_id(&db, 777).await?.unwrap();
        assert_eq!(by_chat.id, created.id);

        assert!(get_customer_by_id(&db, 9999).await?.is_none());
        assert!(get_customer_by_card_number(&db, "000000").await?.is_none());
        assert!(get_customer_by_chat_id(&db, 1).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_require_customer_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let result = require_customer(&db, 42).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::NotFound { entity: "customer", .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_display_name() -> Result<()> {
        let db = setup_test_db().await?;
        let customer = create_test_customer(&db, 0.0).await?;
        assert_eq!(customer.display_name(), "Test Customer");
        Ok(())
    }
}
