//! Store lookup - every transaction must be attributable to an existing store.

use crate::{
    entities::{Store, store},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Finds a store by id.
pub async fn get_store_by_id<C>(db: &C, store_id: i64) -> Result<Option<store::Model>>
where
    C: ConnectionTrait,
{
    Store::find_by_id(store_id).one(db).await.map_err(Into::into)
}

/// Finds a store by id, failing with `NotFound` when absent.
pub async fn require_store<C>(db: &C, store_id: i64) -> Result<store::Model>
where
    C: ConnectionTrait,
{
    get_store_by_id(db, store_id)
        .await?
        .ok_or_else(|| Error::not_found("store", store_id))
}

/// Finds an active store by its exact (trimmed) name.
pub async fn get_store_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<store::Model>> {
    Store::find()
        .filter(store::Column::Name.eq(name.trim()))
        .filter(store::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists active stores ordered by name.
pub async fn get_active_stores(db: &DatabaseConnection) -> Result<Vec<store::Model>> {
    Store::find()
        .filter(store::Column::IsActive.eq(true))
        .order_by_asc(store::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a new active store.
pub async fn create_store(
    db: &DatabaseConnection,
    name: String,
    city: Option<String>,
) -> Result<store::Model> {
    if name.trim().is_empty() {
        return Err(Error::invalid("name", "store name cannot be empty"));
    }

    let store = store::ActiveModel {
        name: Set(name.trim().to_string()),
        city: Set(city),
        is_active: Set(true),
        ..Default::default()
    };

    store.insert(db).await.map_err(Into::into)
}
