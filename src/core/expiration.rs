//! Expiration sweeper - expires earned points older than the retention window.
//!
//! A sweep selects every unexpired `earn` entry created before the expiration
//! cutoff, groups the points by customer, lowers each balance (never below
//! zero) and marks the entries expired. The whole sweep is one storage
//! transaction: either every affected customer is decremented and every
//! selected entry marked, or nothing is. Marked entries are excluded from the
//! next selection, so re-running a sweep is harmless.

use crate::{
    config::database,
    core::{customer, ledger, retention},
    entities::{Customer, customer as customer_entity, ledger_entry},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{TransactionTrait, prelude::*, sea_query::Expr};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{info, warn};

/// What a sweep did (or would do) to one customer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerExpiration {
    /// Affected customer
    pub customer_id: i64,
    /// Sum of the customer's entries that aged past the cutoff
    pub points_to_expire: f64,
    /// Cached balance read inside the sweep
    pub old_balance: f64,
    /// Balance after the sweep, floored at zero
    pub new_balance: f64,
    /// Points actually removed: `old_balance - new_balance`
    pub expired: f64,
    /// Aged points the balance could not cover; non-zero means an integrity
    /// warning was logged for this customer
    pub shortfall: f64,
    /// Entries marked expired for this customer
    pub entry_ids: Vec<i64>,
}

/// Totals of one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    /// Customers with at least one entry past the cutoff
    pub customers_affected: usize,
    /// Points removed from balances
    pub total_points_expired: f64,
    /// Earn entries selected
    pub entries_processed: usize,
    /// True when nothing was written
    pub dry_run: bool,
    /// Expiration cutoff used for the selection
    pub cutoff: DateTime<Utc>,
    /// Per-customer detail, ordered by customer id
    pub customers: Vec<CustomerExpiration>,
}

/// Runs one sweep at the current instant. See [`sweep_expired_points_at`].
pub async fn sweep_expired_points(
    db: &DatabaseConnection,
    retention_days: u32,
    dry_run: bool,
) -> Result<SweepResult> {
    sweep_expired_points_at(db, retention_days, dry_run, Utc::now()).await
}

/// Runs one sweep as of `now`.
///
/// With `dry_run` the same aggregation is computed and reported, and the
/// storage transaction is rolled back instead of committed.
pub async fn sweep_expired_points_at(
    db: &DatabaseConnection,
    retention_days: u32,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<SweepResult> {
    let cutoff = retention::expiration_cutoff(now, retention_days);
    let txn = if dry_run {
        db.begin().await?
    } else {
        database::begin_write(db).await?
    };

    let entries = ledger::unexpired_earn_entries_before(&txn, cutoff, None).await?;
    let entries_processed = entries.len();

    let mut groups: BTreeMap<i64, Vec<ledger_entry::Model>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.customer_id).or_default().push(entry);
    }

    let mut customers = Vec::with_capacity(groups.len());
    for (customer_id, group) in groups {
        let points_to_expire = ledger::total_amount(&group);
        let entry_ids: Vec<i64> = group.iter().map(|entry| entry.id).collect();

        let Some(current) = customer::get_customer_by_id(&txn, customer_id).await? else {
            warn!(
                customer_id,
                points_to_expire,
                entries = entry_ids.len(),
                "Earn entries reference a missing customer, marking them expired"
            );
            if !dry_run {
                ledger::mark_entries_expired(&txn, &entry_ids).await?;
            }
            continue;
        };

        let old_balance = current.current_balance;
        let new_balance = (old_balance - points_to_expire).max(0.0);
        let expired = old_balance - new_balance;
        let shortfall = points_to_expire - expired;

        if shortfall > 0.0 {
            warn!(
                customer_id,
                points_to_expire,
                balance = old_balance,
                shortfall,
                "Integrity warning: points to expire exceed the balance, flooring at zero"
            );
        }

        if !dry_run {
            Customer::update_many()
                .col_expr(customer_entity::Column::CurrentBalance, Expr::value(new_balance))
                .col_expr(customer_entity::Column::LastActivity, Expr::value(now))
                .filter(customer_entity::Column::Id.eq(customer_id))
                .exec(&txn)
                .await?;
            ledger::mark_entries_expired(&txn, &entry_ids).await?;
        }

        customers.push(CustomerExpiration {
            customer_id,
            points_to_expire,
            old_balance,
            new_balance,
            expired,
            shortfall,
            entry_ids,
        });
    }

    if dry_run {
        txn.rollback().await?;
    } else {
        txn.commit().await?;
    }

    let result = SweepResult {
        customers_affected: customers.len(),
        total_points_expired: customers.iter().map(|c| c.expired).sum(),
        entries_processed,
        dry_run,
        cutoff,
        customers,
    };

    info!(
        dry_run,
        %cutoff,
        customers_affected = result.customers_affected,
        total_points_expired = result.total_points_expired,
        entries_processed = result.entries_processed,
        "Expiration sweep finished"
    );
    Ok(result)
}

/// Renders a sweep result for the operator console.
#[must_use]
pub fn format_sweep_summary(result: &SweepResult) -> String {
    let mut out = String::new();
    let heading = if result.dry_run {
        "Expiration sweep (dry run)"
    } else {
        "Expiration sweep"
    };
    let _ = writeln!(out, "**{heading}**");
    let _ = writeln!(out, "Cutoff: {}", result.cutoff.format("%Y-%m-%d"));

    if result.customers.is_empty() && result.entries_processed == 0 {
        out.push_str("Nothing to expire.");
        return out;
    }

    let _ = writeln!(
        out,
        "Customers affected: {}\nEntries processed: {}\nPoints expired: {:.2}",
        result.customers_affected, result.entries_processed, result.total_points_expired
    );
    for detail in &result.customers {
        let _ = write!(
            out,
            "\n• #{}: {:.2} → {:.2} (-{:.2}",
            detail.customer_id, detail.old_balance, detail.new_balance, detail.expired
        );
        if detail.shortfall > 0.0 {
            let _ = write!(
                out,
                ", {:.2} aged out, {:.2} uncovered",
                detail.points_to_expire, detail.shortfall
            );
        }
        out.push(')');
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::ledger_entry::EntryKind;
    use crate::test_utils::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_sweep_expires_aged_entry() -> Result<()> {
        let (db, customer, store) = setup_with_customer(100.0).await?;
        let now = Utc::now();
        let entry = insert_test_entry(&db, customer.id, store.id, EntryKind::Earn, 100.0, now - Duration::days(46)).await?;

        let result = sweep_expired_points_at(&db, 45, false, now).await?;
        assert_eq!(result.customers_affected, 1);
        assert_eq!(result.entries_processed, 1);
        assert_eq!(result.total_points_expired, 100.0);
        assert!(!result.dry_run);

        let updated = customer::require_customer(&db, customer.id).await?;
        assert_eq!(updated.current_balance, 0.0);
        assert!(ledger::get_entry_by_id(&db, entry.id).await?.unwrap().is_expired());

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_floors_over_redeemed_balance() -> Result<()> {
        let (db, customer, store) = setup_with_customer(30.0).await?;
        let now = Utc::now();
        insert_test_entry(&db, customer.id, store.id, EntryKind::Earn, 100.0, now - Duration::days(50)).await?;
        insert_test_entry(&db, customer.id, store.id, EntryKind::Spend, 70.0, now - Duration::days(40)).await?;

        let result = sweep_expired_points_at(&db, 45, false, now).await?;
        assert_eq!(result.total_points_expired, 30.0);

        let detail = &result.customers[0];
        assert_eq!(detail.points_to_expire, 100.0);
        assert_eq!(detail.old_balance, 30.0);
        assert_eq!(detail.new_balance, 0.0);
        assert_eq!(detail.expired, 30.0);
        assert!(detail.expired <= detail.old_balance);
        assert_eq!(detail.shortfall, 70.0);
        assert!(format_sweep_summary(&result).contains("70.00 uncovered"));

        assert_eq!(customer::require_customer(&db, customer.id).await?.current_balance, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() -> Result<()> {
        let (db, customer, store) = setup_with_customer(120.0).await?;
        let now = Utc::now();
        insert_test_entry(&db, customer.id, store.id, EntryKind::Earn, 80.0, now - Duration::days(60)).await?;
        insert_test_entry(&db, customer.id, store.id, EntryKind::Earn, 40.0, now - Duration::days(5)).await?;

        let first = sweep_expired_points_at(&db, 45, false, now).await?;
        assert_eq!(first.total_points_expired, 80.0);
        assert_eq!(first.customers[0].shortfall, 0.0);

        let second = sweep_expired_points_at(&db, 45, false, now).await?;
        assert_eq!(second.customers_affected, 0);
        assert_eq!(second.entries_processed, 0);
        assert_eq!(second.total_points_expired, 0.0);

        assert_eq!(customer::require_customer(&db, customer.id).await?.current_balance, 40.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() -> Result<()> {
        let (db, customer, store) = setup_with_customer(100.0).await?;
        let now = Utc::now();
        let entry = insert_test_entry(&db, customer.id, store.id, EntryKind::Earn, 60.0, now - Duration::days(46)).await?;

        let result = sweep_expired_points_at(&db, 45, true, now).await?;
        assert!(result.dry_run);
        assert_eq!(result.total_points_expired, 60.0);
        assert_eq!(result.customers[0].new_balance, 40.0);

        assert_eq!(customer::require_customer(&db, customer.id).await?.current_balance, 100.0);
        assert!(!ledger::get_entry_by_id(&db, entry.id).await?.unwrap().is_expired());

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_groups_by_customer_and_skips_spend() -> Result<()> {
        let (db, first, store) = setup_with_customer(200.0).await?;
        let second = create_custom_customer(&db, 888, None, 50.0).await?;
        let now = Utc::now();

        insert_test_entry(&db, first.id, store.id, EntryKind::Earn, 30.0, now - Duration::days(70)).await?;
        insert_test_entry(&db, first.id, store.id, EntryKind::Earn, 20.0, now - Duration::days(47)).await?;
        insert_test_entry(&db, first.id, store.id, EntryKind::Spend, 90.0, now - Duration::days(47)).await?;
        insert_test_entry(&db, second.id, store.id, EntryKind::Earn, 10.0, now - Duration::days(46)).await?;

        let result = sweep_expired_points_at(&db, 45, false, now).await?;
        assert_eq!(result.customers_affected, 2);
        assert_eq!(result.entries_processed, 3);
        assert_eq!(result.total_points_expired, 60.0);
        assert_eq!(result.customers[0].customer_id, first.id);
        assert_eq!(result.customers[0].entry_ids.len(), 2);

        assert_eq!(customer::require_customer(&db, first.id).await?.current_balance, 150.0);
        assert_eq!(customer::require_customer(&db, second.id).await?.current_balance, 40.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_respects_cutoff_boundary() -> Result<()> {
        let (db, customer, store) = setup_with_customer(100.0).await?;
        let now = Utc::now();
        let cutoff = retention::expiration_cutoff(now, 45);
        insert_test_entry(&db, customer.id, store.id, EntryKind::Earn, 100.0, cutoff).await?;

        let result = sweep_expired_points_at(&db, 45, false, now).await?;
        assert_eq!(result.entries_processed, 0);
        assert_eq!(result.cutoff, cutoff);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sweep_overlapping_purchases_on_pooled_file_database() -> Result<()> {
        use crate::{
            config::LoyaltySettings,
            core::balance::{self, PostTransaction},
        };

        let dir = tempfile::tempdir()?;
        let db = setup_file_db(dir.path(), 8).await?;
        let customer = create_test_customer(&db, 1000.0).await?;
        let store = create_test_store(&db, "Test Store").await?;
        let now = Utc::now();
        insert_test_entry(&db, customer.id, store.id, EntryKind::Earn, 100.0, now - Duration::days(46)).await?;

        let mut purchases = Vec::new();
        for _ in 0..10 {
            let db = db.clone();
            let request = PostTransaction {
                customer_id: customer.id,
                store_id: store.id,
                check_amount: 1000.0,
                points_to_redeem: 10.0,
                points_to_earn: 5.0,
                metadata: None,
            };
            purchases.push(tokio::spawn(async move {
                balance::post_transaction(&db, &LoyaltySettings::default(), request).await
            }));
        }
        let sweep = {
            let db = db.clone();
            tokio::spawn(async move { sweep_expired_points_at(&db, 45, false, now).await })
        };

        for handle in purchases {
            handle.await.unwrap()?;
        }
        let result = sweep.await.unwrap()?;
        assert_eq!(result.total_points_expired, 100.0);

        // 1000 - 100 expired - 10 * (10 - 5)
        let updated = customer::require_customer(&db, customer.id).await?;
        assert_eq!(updated.current_balance, 850.0);
        assert_eq!(updated.total_purchases, 10);

        Ok(())
    }

    #[test]
    fn test_format_sweep_summary() {
        let cutoff = Utc::now();
        let empty = SweepResult {
            customers_affected: 0,
            total_points_expired: 0.0,
            entries_processed: 0,
            dry_run: true,
            cutoff,
            customers: Vec::new(),
        };
        let text = format_sweep_summary(&empty);
        assert!(text.contains("dry run"));
        assert!(text.contains("Nothing to expire"));

        let result = SweepResult {
            customers_affected: 1,
            total_points_expired: 30.0,
            entries_processed: 1,
            dry_run: false,
            cutoff,
            customers: vec![CustomerExpiration {
                customer_id: 7,
                points_to_expire: 100.0,
                old_balance: 30.0,
                new_balance: 0.0,
                expired: 30.0,
                shortfall: 70.0,
                entry_ids: vec![1],
            }],
        };
        let text = format_sweep_summary(&result);
        assert!(text.contains("Points expired: 30.00"));
        assert!(text.contains("#7: 30.00 → 0.00 (-30.00, 100.00 aged out, 70.00 uncovered)"));
    }
}
