//! Database configuration module for the loyalty ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.
//! Every statement is issued with `IF NOT EXISTS` so the binary can restart
//! against an existing database file.

use crate::entities::{Customer, LedgerEntry, LoyaltySettingsRecord, PendingDiscount, Store};
use crate::errors::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, EntityTrait, Schema, TransactionTrait,
};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/loyalty.sqlite?mode=rwc";
/// Pool size of the production connection.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;
/// How long a caller waits for a free pooled connection.
const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Gets the database URL from the `DATABASE_URL` environment variable or
/// returns the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the `SQLite` database named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    connect(&database_url, DEFAULT_MAX_CONNECTIONS).await
}

/// Opens a pool of up to `max_connections` connections to `database_url`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {} ({} connections)", database_url, max_connections);
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS));
    Database::connect(options).await.map_err(Into::into)
}

/// Begins a transaction that holds the database write lock from its first
/// statement.
///
/// `SQLite` cannot queue a deferred transaction that read before writing: its
/// lock upgrade fails with `SQLITE_BUSY` at once while another connection
/// writes. Issuing a write first takes the lock under the busy timeout
/// instead, the same way `BEGIN IMMEDIATE` does, so concurrent writers run one
/// after the other.
pub async fn begin_write(db: &DatabaseConnection) -> Result<DatabaseTransaction> {
    let txn = db.begin().await?;
    if txn.get_database_backend() == DatabaseBackend::Sqlite {
        txn.execute_unprepared("UPDATE customers SET id = id WHERE 0")
            .await?;
    }
    Ok(txn)
}

async fn create_table<E, C>(db: &C, entity: E) -> Result<()>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all necessary database tables from the entity definitions.
///
/// Referenced tables are created before the tables holding foreign keys to them.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    create_table(db, Store).await?;
    create_table(db, Customer).await?;
    create_table(db, LedgerEntry).await?;
    create_table(db, PendingDiscount).await?;
    create_table(db, LoyaltySettingsRecord).await?;
    info!("Database tables ensured.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        CustomerModel, LedgerEntryModel, LoyaltySettingsModel, PendingDiscountModel, StoreModel,
    };
    use sea_orm::{ActiveModelTrait, QuerySelect, Set};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<StoreModel> = Store::find().limit(1).all(&db).await?;
        let _: Vec<CustomerModel> = Customer::find().limit(1).all(&db).await?;
        let _: Vec<LedgerEntryModel> = LedgerEntry::find().limit(1).all(&db).await?;
        let _: Vec<PendingDiscountModel> = PendingDiscount::find().limit(1).all(&db).await?;
        let _: Vec<LoyaltySettingsModel> = LoyaltySettingsRecord::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_begin_write_commits_and_rolls_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("ledger.sqlite").display());
        let db = connect(&url, 4).await?;
        create_tables(&db).await?;

        let store = |name: &str| crate::entities::store::ActiveModel {
            name: Set(name.to_string()),
            is_active: Set(true),
            ..Default::default()
        };

        let txn = begin_write(&db).await?;
        store("Kept").insert(&txn).await?;
        txn.commit().await?;

        let txn = begin_write(&db).await?;
        store("Discarded").insert(&txn).await?;
        txn.rollback().await?;

        let stores = Store::find().all(&db).await?;
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].name, "Kept");
        Ok(())
    }
}
