//! Ledger store - the durable, ordered record of point-affecting events.
//!
//! Entries are appended by the balance engine and never rewritten, except for
//! the one-way expiry marker set by the sweeper. The query that selects
//! "unexpired earn entries older than the cutoff" lives here so the sweeper and
//! the read-side balance reconciliation share exactly one definition of it.

use crate::{
    core::retention,
    entities::{
        LedgerEntry, ledger_entry,
        ledger_entry::{EXPIRED_MARKER, EntryKind},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{Condition, QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of entries in the recent-activity feed of a store.
pub const DEFAULT_RECENT_LIMIT: u64 = 10;
/// Upper bound on the recent-activity feed of a store.
pub const MAX_RECENT_LIMIT: u64 = 50;

/// Known, optional details recorded by the checkout about a purchase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    /// Name of the cashier who rang the purchase up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cashier_name: Option<String>,
    /// Terminal identifier at the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,
    /// Payment method (cash, card, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    /// Receipt number printed by the till
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
}

impl TransactionMetadata {
    /// Encodes the metadata for the `metadata` column.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::from)
    }

    /// Decodes the `metadata` column of an entry. Unknown fields are ignored.
    pub fn decode(entry: &ledger_entry::Model) -> Result<Option<Self>> {
        entry
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(Error::from)
    }
}

/// A ledger entry about to be appended.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    /// Owning customer
    pub customer_id: i64,
    /// Store the purchase happened at
    pub store_id: i64,
    /// Store name captured at write time
    pub store_name: String,
    /// History title
    pub title: String,
    /// `earn` or `spend`
    pub kind: EntryKind,
    /// Points credited or redeemed
    pub amount: f64,
    /// Check total
    pub check_amount: f64,
    /// Points redeemed by the purchase
    pub points_redeemed: f64,
    /// Points earned by the purchase
    pub points_earned: f64,
    /// Optional checkout details
    pub metadata: Option<TransactionMetadata>,
    /// Server-assigned creation instant
    pub created_at: DateTime<Utc>,
}

/// Aggregate activity of one customer over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActivitySummary {
    /// Points credited in the window
    pub earned: f64,
    /// Points redeemed in the window
    pub redeemed: f64,
    /// Ledger entries written in the window
    pub entries: u64,
}

/// Points that have expired or are about to.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExpiringPointsSummary {
    /// Already past the cutoff but not yet swept
    pub expired_now: f64,
    /// Expiring within the next 7 days
    pub expiring_in_7_days: f64,
    /// Expiring in 7 to 14 days
    pub expiring_in_14_days: f64,
    /// Expiring in 14 to 30 days
    pub expiring_in_30_days: f64,
}

/// Appends one entry. Only the balance engine calls this, inside its transaction.
pub async fn append_entry<C>(db: &C, entry: NewLedgerEntry) -> Result<ledger_entry::Model>
where
    C: ConnectionTrait,
{
    let metadata = entry
        .metadata
        .as_ref()
        .map(TransactionMetadata::encode)
        .transpose()?;

    let model = ledger_entry::ActiveModel {
        customer_id: Set(entry.customer_id),
        store_id: Set(Some(entry.store_id)),
        title: Set(entry.title),
        kind: Set(entry.kind),
        amount: Set(entry.amount),
        check_amount: Set(Some(entry.check_amount)),
        points_redeemed: Set(Some(entry.points_redeemed)),
        points_earned: Set(Some(entry.points_earned)),
        expiry_marker: Set(None),
        store_name: Set(Some(entry.store_name)),
        metadata: Set(metadata),
        created_at: Set(entry.created_at),
        ..Default::default()
    };

    model.insert(db).await.map_err(Into::into)
}

/// Retrieves a specific entry by its id.
pub async fn get_entry_by_id<C>(db: &C, entry_id: i64) -> Result<Option<ledger_entry::Model>>
where
    C: ConnectionTrait,
{
    LedgerEntry::find_by_id(entry_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// History of one customer, newest first, optionally limited to entries created
/// at or after `since` (the statistics cutoff for "last 45 days" views).
pub async fn history_for_customer(
    db: &DatabaseConnection,
    customer_id: i64,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<ledger_entry::Model>> {
    let mut query = LedgerEntry::find().filter(ledger_entry::Column::CustomerId.eq(customer_id));
    if let Some(since) = since {
        query = query.filter(ledger_entry::Column::CreatedAt.gte(since));
    }
    query
        .order_by_desc(ledger_entry::Column::CreatedAt)
        .order_by_desc(ledger_entry::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Most recent entries written at a store, newest first.
///
/// `limit` defaults to [`DEFAULT_RECENT_LIMIT`] and is capped at [`MAX_RECENT_LIMIT`].
pub async fn recent_for_store(
    db: &DatabaseConnection,
    store_id: i64,
    limit: Option<u64>,
) -> Result<Vec<ledger_entry::Model>> {
    let limit = limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);

    LedgerEntry::find()
        .filter(ledger_entry::Column::StoreId.eq(store_id))
        .order_by_desc(ledger_entry::Column::CreatedAt)
        .order_by_desc(ledger_entry::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Filter matching entries that still count toward a balance.
fn not_expired() -> Condition {
    Condition::any()
        .add(ledger_entry::Column::ExpiryMarker.is_null())
        .add(ledger_entry::Column::ExpiryMarker.ne(EXPIRED_MARKER))
}

/// Unexpired `earn` entries created strictly before `cutoff`, oldest first.
///
/// With `customer_id` set only that customer's entries are returned.
pub async fn unexpired_earn_entries_before<C>(
    db: &C,
    cutoff: DateTime<Utc>,
    customer_id: Option<i64>,
) -> Result<Vec<ledger_entry::Model>>
where
    C: ConnectionTrait,
{
    let mut query = LedgerEntry::find()
        .filter(ledger_entry::Column::Kind.eq(EntryKind::Earn))
        .filter(ledger_entry::Column::CreatedAt.lt(cutoff))
        .filter(not_expired());
    if let Some(customer_id) = customer_id {
        query = query.filter(ledger_entry::Column::CustomerId.eq(customer_id));
    }

    let entries = query
        .order_by_asc(ledger_entry::Column::CreatedAt)
        .order_by_asc(ledger_entry::Column::Id)
        .all(db)
        .await?;
    debug!(
        count = entries.len(),
        %cutoff,
        ?customer_id,
        "Selected unexpired earn entries before cutoff"
    );
    Ok(entries)
}

/// Sets the expiry marker on the given entries. Already-marked entries are left alone.
pub async fn mark_entries_expired<C>(db: &C, entry_ids: &[i64]) -> Result<u64>
where
    C: ConnectionTrait,
{
    if entry_ids.is_empty() {
        return Ok(0);
    }

    let result = LedgerEntry::update_many()
        .col_expr(
            ledger_entry::Column::ExpiryMarker,
            Expr::value(EXPIRED_MARKER),
        )
        .filter(ledger_entry::Column::Id.is_in(entry_ids.iter().copied()))
        .filter(not_expired())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Sum of the `amount` column over `entries`.
#[must_use]
pub fn total_amount(entries: &[ledger_entry::Model]) -> f64 {
    entries.iter().map(|entry| entry.amount).sum()
}

/// Earned and redeemed points of one customer since `since`.
pub async fn activity_summary(
    db: &DatabaseConnection,
    customer_id: i64,
    since: DateTime<Utc>,
) -> Result<ActivitySummary> {
    let entries = history_for_customer(db, customer_id, Some(since)).await?;

    let mut summary = ActivitySummary::default();
    for entry in &entries {
        match entry.kind {
            EntryKind::Earn => summary.earned += entry.amount,
            EntryKind::Spend => summary.redeemed += entry.amount,
        }
    }
    summary.entries = entries.len() as u64;
    Ok(summary)
}

/// Splits a customer's unexpired earn entries by how soon they expire.
pub async fn expiring_points_summary(
    db: &DatabaseConnection,
    customer_id: i64,
    now: DateTime<Utc>,
    retention_days: u32,
) -> Result<ExpiringPointsSummary> {
    let cutoff = retention::expiration_cutoff(now, retention_days);
    let horizon = cutoff + Duration::days(30);
    let live = unexpired_earn_entries_before(db, horizon, Some(customer_id)).await?;

    let mut summary = ExpiringPointsSummary::default();
    for entry in live {
        let expires_in = entry.created_at - cutoff;
        if entry.created_at < cutoff {
            summary.expired_now += entry.amount;
        } else if expires_in < Duration::days(7) {
            summary.expiring_in_7_days += entry.amount;
        } else if expires_in < Duration::days(14) {
            summary.expiring_in_14_days += entry.amount;
        } else {
            summary.expiring_in_30_days += entry.amount;
        }
    }
    Ok(summary)
}
