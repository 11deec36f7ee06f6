//! Shared test utilities for the loyalty ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test customers, stores and ledger entries with sensible defaults.

use crate::{
    core::{
        customer::{self, NewCustomer},
        ledger::{self, NewLedgerEntry},
        store,
    },
    entities::{self, ledger_entry::EntryKind},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Routes tracing output through the test harness; safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// The pool is pinned to one connection: every connection to `sqlite::memory:`
/// opens its own empty database, and concurrent tests must share one.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database under `dir` with a pool of
/// `connections` connections, the way the binary connects.
pub async fn setup_file_db(dir: &Path, connections: u32) -> Result<DatabaseConnection> {
    init_test_tracing();
    let url = format!("sqlite://{}?mode=rwc", dir.join("loyalty.sqlite").display());
    let db = crate::config::database::connect(&url, connections).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test customer named "Test Customer" with the given balance.
///
/// # Defaults
/// * `chat_id`: 100001
/// * `card_number`: None
pub async fn create_test_customer(
    db: &DatabaseConnection,
    balance: f64,
) -> Result<entities::customer::Model> {
    customer::create_customer(
        db,
        NewCustomer {
            chat_id: 100_001,
            card_number: None,
            first_name: "Test".to_string(),
            last_name: Some("Customer".to_string()),
            opening_balance: balance,
        },
    )
    .await
}

/// Creates a test customer with custom parameters.
/// Use this when a test needs several customers or a card number.
pub async fn create_custom_customer(
    db: &DatabaseConnection,
    chat_id: i64,
    card_number: Option<&str>,
    balance: f64,
) -> Result<entities::customer::Model> {
    customer::create_customer(
        db,
        NewCustomer {
            chat_id,
            card_number: card_number.map(str::to_string),
            first_name: format!("Customer {chat_id}"),
            last_name: None,
            opening_balance: balance,
        },
    )
    .await
}

/// Creates an active test store.
pub async fn create_test_store(db: &DatabaseConnection, name: &str) -> Result<entities::store::Model> {
    store::create_store(db, name.to_string(), Some("Test City".to_string())).await
}

/// Sets up a complete test environment with one customer and one store.
/// Returns (db, customer, store) for common test scenarios.
pub async fn setup_with_customer(
    balance: f64,
) -> Result<(
    DatabaseConnection,
    entities::customer::Model,
    entities::store::Model,
)> {
    let db = setup_test_db().await?;
    let customer = create_test_customer(&db, balance).await?;
    let store = create_test_store(&db, "Test Store").await?;
    Ok((db, customer, store))
}

/// Appends a ledger entry directly, bypassing the balance engine.
///
/// Used to lay out history at arbitrary instants; the customer's cached
/// balance is not touched.
pub async fn insert_test_entry(
    db: &DatabaseConnection,
    customer_id: i64,
    store_id: i64,
    kind: EntryKind,
    amount: f64,
    created_at: DateTime<Utc>,
) -> Result<entities::ledger_entry::Model> {
    let (points_redeemed, points_earned) = match kind {
        EntryKind::Earn => (0.0, amount),
        EntryKind::Spend => (amount, 0.0),
    };
    ledger::append_entry(
        db,
        NewLedgerEntry {
            customer_id,
            store_id,
            store_name: "Test Store".to_string(),
            title: format!("Test {kind} entry"),
            kind,
            amount,
            check_amount: amount * 10.0,
            points_redeemed,
            points_earned,
            metadata: None,
            created_at,
        },
    )
    .await
}
