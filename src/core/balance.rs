//! Balance engine - posts purchases against a customer's point balance.
//!
//! [`post_transaction`] is the only writer of balance-increasing or
//! balance-decreasing events. Every precondition is checked before the first
//! write, and every write (balance, statistics, ledger entries, pending discount)
//! happens inside one storage transaction. The balance update itself is guarded
//! by `current_balance >= points_to_redeem`, so two concurrent redemptions can
//! never overdraw the same customer even if both passed the read-side check.
//!
//! [`available_balance`] is the read-side reconciliation: it subtracts points
//! the next sweep will expire from the cached balance without writing anything.

use crate::{
    config::{LoyaltySettings, database},
    core::{
        customer,
        ledger::{self, NewLedgerEntry, TransactionMetadata},
        pending_discount, retention, store,
    },
    entities::{Customer, customer as customer_entity, ledger_entry::EntryKind},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// A purchase posted by the checkout.
#[derive(Debug, Clone, Default)]
pub struct PostTransaction {
    /// Paying customer
    pub customer_id: i64,
    /// Store the purchase happened at
    pub store_id: i64,
    /// Check total in currency units
    pub check_amount: f64,
    /// Points the customer spends as a discount
    pub points_to_redeem: f64,
    /// Points credited for this purchase
    pub points_to_earn: f64,
    /// Optional checkout details stored on every entry written
    pub metadata: Option<TransactionMetadata>,
}

/// Outcome of a committed [`post_transaction`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResult {
    /// Cached balance after the purchase
    pub new_balance: f64,
    /// Every ledger entry written, in write order
    pub ledger_entry_ids: Vec<i64>,
    /// The `spend` entry, when points were redeemed
    pub spend_entry_id: Option<i64>,
    /// The `earn` entry, when one was written
    pub earn_entry_id: Option<i64>,
    /// Discount queued for the store terminal, when points were redeemed
    pub pending_discount_id: Option<i64>,
}

/// A customer's balance as the next sweep will leave it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvailableBalance {
    /// Spendable points right now, never negative
    pub available: f64,
    /// Points past the cutoff that the sweeper has not processed yet
    pub expired_not_yet_swept: f64,
    /// True when the cached balance will change at the next sweep
    pub needs_sync: bool,
    /// Balance currently stored on the customer row
    pub cached_balance: f64,
}

fn require_finite(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid(field, format!("must be a finite number, got {value}")))
    }
}

/// Numeric validation that needs no storage access.
fn validate_amounts(request: &PostTransaction, settings: &LoyaltySettings) -> Result<()> {
    require_finite("check_amount", request.check_amount)?;
    require_finite("points_to_redeem", request.points_to_redeem)?;
    require_finite("points_to_earn", request.points_to_earn)?;

    if request.check_amount <= 0.0 {
        return Err(Error::invalid(
            "check_amount",
            format!("must be positive, got {}", request.check_amount),
        ));
    }
    if request.points_to_redeem < 0.0 {
        return Err(Error::invalid(
            "points_to_redeem",
            format!("cannot be negative, got {}", request.points_to_redeem),
        ));
    }
    if request.points_to_earn < 0.0 {
        return Err(Error::invalid(
            "points_to_earn",
            format!("cannot be negative, got {}", request.points_to_earn),
        ));
    }
    if request.points_to_redeem > 0.0 && request.points_to_redeem < settings.min_redemption_amount {
        return Err(Error::invalid(
            "points_to_redeem",
            format!(
                "minimum redemption is {}, got {}",
                settings.min_redemption_amount, request.points_to_redeem
            ),
        ));
    }
    Ok(())
}

/// Largest redemption allowed on a check of `check_amount`.
#[must_use]
pub fn redemption_cap(check_amount: f64, settings: &LoyaltySettings) -> f64 {
    (check_amount * settings.max_discount_fraction()).floor()
}

/// Posts a purchase at the current instant. See [`post_transaction_at`].
pub async fn post_transaction(
    db: &DatabaseConnection,
    settings: &LoyaltySettings,
    request: PostTransaction,
) -> Result<TransactionResult> {
    post_transaction_at(db, settings, request, Utc::now()).await
}

/// Posts a purchase as of `now`.
///
/// Checks, in order: numeric arguments, customer existence, balance
/// sufficiency, the redemption cap, and store existence. Any failure leaves
/// storage untouched. On success the balance moves by
/// `points_to_earn - points_to_redeem`, the purchase count grows by one and the
/// lifetime savings by the redeemed points.
pub async fn post_transaction_at(
    db: &DatabaseConnection,
    settings: &LoyaltySettings,
    request: PostTransaction,
    now: DateTime<Utc>,
) -> Result<TransactionResult> {
    validate_amounts(&request, settings)?;

    let redeem = request.points_to_redeem;
    let earn = request.points_to_earn;

    let txn = database::begin_write(db).await?;

    let customer = customer::require_customer(&txn, request.customer_id).await?;
    if redeem > 0.0 && customer.current_balance < redeem {
        return Err(Error::InsufficientBalance {
            required: redeem,
            available: customer.current_balance,
        });
    }

    let cap = redemption_cap(request.check_amount, settings);
    if redeem > cap {
        return Err(Error::LimitExceeded {
            requested: redeem,
            cap,
        });
    }

    let store = store::require_store(&txn, request.store_id).await?;

    // Guarded write: a concurrent redemption committed since the read above
    // makes this match zero rows instead of overdrawing.
    let updated = Customer::update_many()
        .col_expr(
            customer_entity::Column::CurrentBalance,
            Expr::col(customer_entity::Column::CurrentBalance).add(earn - redeem),
        )
        .col_expr(
            customer_entity::Column::TotalPurchases,
            Expr::col(customer_entity::Column::TotalPurchases).add(1),
        )
        .col_expr(
            customer_entity::Column::TotalSaved,
            Expr::col(customer_entity::Column::TotalSaved).add(redeem),
        )
        .col_expr(customer_entity::Column::LastActivity, Expr::value(now))
        .filter(customer_entity::Column::Id.eq(customer.id))
        .filter(customer_entity::Column::CurrentBalance.gte(redeem))
        .exec(&txn)
        .await?;

    if updated.rows_affected == 0 {
        let current = customer::require_customer(&txn, customer.id).await?;
        return Err(Error::InsufficientBalance {
            required: redeem,
            available: current.current_balance,
        });
    }

    let entry = |kind: EntryKind, title: &str, amount: f64, points_redeemed: f64| NewLedgerEntry {
        customer_id: customer.id,
        store_id: store.id,
        store_name: store.name.clone(),
        title: title.to_string(),
        kind,
        amount,
        check_amount: request.check_amount,
        points_redeemed,
        points_earned: earn,
        metadata: request.metadata.clone(),
        created_at: now,
    };

    let mut ledger_entry_ids = Vec::with_capacity(2);
    let mut spend_entry_id = None;
    let mut earn_entry_id = None;
    let mut pending_discount_id = None;

    if redeem > 0.0 {
        let spend = ledger::append_entry(
            &txn,
            entry(EntryKind::Spend, "Points redeemed for purchase", redeem, redeem),
        )
        .await?;
        ledger_entry_ids.push(spend.id);
        spend_entry_id = Some(spend.id);

        if earn > 0.0 {
            let earned = ledger::append_entry(
                &txn,
                entry(EntryKind::Earn, "Cashback for purchase", earn, 0.0),
            )
            .await?;
            ledger_entry_ids.push(earned.id);
            earn_entry_id = Some(earned.id);
        }

        let discount = pending_discount::create_pending_discount(
            &txn,
            store.id,
            spend.id,
            redeem,
            now,
            settings.pending_discount_window(),
        )
        .await?;
        pending_discount_id = Some(discount.id);
    } else {
        let earned = ledger::append_entry(
            &txn,
            entry(EntryKind::Earn, "Points earned for purchase", earn, 0.0),
        )
        .await?;
        ledger_entry_ids.push(earned.id);
        earn_entry_id = Some(earned.id);
    }

    let refreshed = customer::require_customer(&txn, customer.id).await?;

    txn.commit().await?;

    info!(
        customer_id = customer.id,
        store_id = store.id,
        check_amount = request.check_amount,
        redeemed = redeem,
        earned = earn,
        new_balance = refreshed.current_balance,
        ?pending_discount_id,
        "Transaction posted"
    );

    Ok(TransactionResult {
        new_balance: refreshed.current_balance,
        ledger_entry_ids,
        spend_entry_id,
        earn_entry_id,
        pending_discount_id,
    })
}

/// Reconciles `cached_balance` against points that have aged past the
/// expiration cutoff but have not been swept yet. Never writes.
///
/// Uses the same cutoff and the same entry selection as the sweeper, so the
/// result matches what the next sweep will leave on the customer row.
pub async fn available_balance_for<C>(
    db: &C,
    customer_id: i64,
    cached_balance: f64,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Result<AvailableBalance>
where
    C: ConnectionTrait,
{
    let cutoff = retention::expiration_cutoff(now, retention_days);
    let stale = ledger::unexpired_earn_entries_before(db, cutoff, Some(customer_id)).await?;
    let expired_not_yet_swept = ledger::total_amount(&stale);
    let available = (cached_balance - expired_not_yet_swept).max(0.0);

    debug!(
        customer_id,
        cached_balance, expired_not_yet_swept, available, "Available balance computed"
    );

    Ok(AvailableBalance {
        available,
        expired_not_yet_swept,
        needs_sync: expired_not_yet_swept > 0.0,
        cached_balance,
    })
}

/// Looks the customer up and reconciles their cached balance as of now.
pub async fn available_balance(
    db: &DatabaseConnection,
    customer_id: i64,
    retention_days: u32,
) -> Result<AvailableBalance> {
    available_balance_at(db, customer_id, retention_days, Utc::now()).await
}

/// [`available_balance`] as of `now`.
pub async fn available_balance_at(
    db: &DatabaseConnection,
    customer_id: i64,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Result<AvailableBalance> {
    let customer = customer::require_customer(db, customer_id).await?;
    available_balance_for(db, customer.id, customer.current_balance, retention_days, now).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::{DiscountStatus, LedgerEntry, PendingDiscount, ledger_entry};
    use crate::test_utils::*;
    use chrono::{Duration, SubsecRound};
    use sea_orm::PaginatorTrait;

    fn purchase(customer_id: i64, store_id: i64, check: f64, redeem: f64, earn: f64) -> PostTransaction {
        PostTransaction {
            customer_id,
            store_id,
            check_amount: check,
            points_to_redeem: redeem,
            points_to_earn: earn,
            metadata: None,
        }
    }

    async fn entry_count(db: &DatabaseConnection) -> Result<u64> {
        Ok(LedgerEntry::find().count(db).await?)
    }

    async fn discount_count(db: &DatabaseConnection) -> Result<u64> {
        Ok(PendingDiscount::find().count(db).await?)
    }

    #[tokio::test]
    async fn test_post_transaction_argument_validation() -> Result<()> {
        let (db, customer, store) = setup_with_customer(100.0).await?;
        let settings = LoyaltySettings::default();
        let (c, s) = (customer.id, store.id);

        for request in [
            purchase(c, s, 0.0, 0.0, 10.0),
            purchase(c, s, -5.0, 0.0, 10.0),
            purchase(c, s, f64::NAN, 0.0, 10.0),
            purchase(c, s, 100.0, -1.0, 0.0),
            purchase(c, s, 100.0, 0.0, -1.0),
            purchase(c, s, 100.0, f64::INFINITY, 0.0),
            purchase(c, s, 100.0, 0.5, 0.0),
        ] {
            let result = post_transaction(&db, &settings, request).await;
            assert!(matches!(result.unwrap_err(), Error::InvalidArgument { .. }));
        }

        assert_eq!(entry_count(&db).await?, 0);
        let unchanged = customer::require_customer(&db, customer.id).await?;
        assert_eq!(unchanged.current_balance, 100.0);
        assert_eq!(unchanged.total_purchases, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_earn_only_purchase() -> Result<()> {
        let (db, customer, store) = setup_with_customer(500.0).await?;

        let result = post_transaction(
            &db,
            &LoyaltySettings::default(),
            purchase(customer.id, store.id, 1000.0, 0.0, 40.0),
        )
        .await?;

        assert_eq!(result.new_balance, 540.0);
        assert_eq!(result.ledger_entry_ids.len(), 1);
        assert!(result.spend_entry_id.is_none());
        assert!(result.pending_discount_id.is_none());

        let entry = ledger::get_entry_by_id(&db, result.ledger_entry_ids[0]).await?.unwrap();
        assert_eq!(entry.kind, EntryKind::Earn);
        assert_eq!(entry.amount, 40.0);
        assert_eq!(entry.check_amount, Some(1000.0));
        assert_eq!(entry.store_name.as_deref(), Some(store.name.as_str()));
        assert_eq!(discount_count(&db).await?, 0);

        let updated = customer::require_customer(&db, customer.id).await?;
        assert_eq!(updated.current_balance, 540.0);
        assert_eq!(updated.total_purchases, 1);
        assert_eq!(updated.total_saved, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_and_earn_purchase() -> Result<()> {
        let (db, customer, store) = setup_with_customer(2210.0).await?;
        let now = Utc::now().trunc_subsecs(0);

        let result = post_transaction_at(
            &db,
            &LoyaltySettings::default(),
            purchase(customer.id, store.id, 1000.0, 200.0, 40.0),
            now,
        )
        .await?;

        assert_eq!(result.new_balance, 2050.0);
        assert_eq!(result.ledger_entry_ids.len(), 2);

        let spend = ledger::get_entry_by_id(&db, result.spend_entry_id.unwrap()).await?.unwrap();
        assert_eq!(spend.kind, EntryKind::Spend);
        assert_eq!(spend.amount, 200.0);
        assert_eq!(spend.check_amount, Some(1000.0));
        assert_eq!(spend.points_redeemed, Some(200.0));
        assert_eq!(spend.points_earned, Some(40.0));

        let earned = ledger::get_entry_by_id(&db, result.earn_entry_id.unwrap()).await?.unwrap();
        assert_eq!(earned.kind, EntryKind::Earn);
        assert_eq!(earned.amount, 40.0);

        assert_eq!(discount_count(&db).await?, 1);
        let discount = PendingDiscount::find_by_id(result.pending_discount_id.unwrap())
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(discount.discount_amount, 200.0);
        assert_eq!(discount.ledger_entry_id, spend.id);
        assert_eq!(discount.store_id, store.id);
        assert_eq!(discount.status, DiscountStatus::Pending);
        assert_eq!(discount.expires_at, now + Duration::seconds(90));

        let updated = customer::require_customer(&db, customer.id).await?;
        assert_eq!(updated.total_saved, 200.0);
        assert_eq!(updated.total_purchases, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_balance_changes_nothing() -> Result<()> {
        let (db, customer, store) = setup_with_customer(50.0).await?;

        let result = post_transaction(
            &db,
            &LoyaltySettings::default(),
            purchase(customer.id, store.id, 1000.0, 100.0, 10.0),
        )
        .await;

        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientBalance { required, available } if required == 100.0 && available == 50.0
        ));
        assert_eq!(entry_count(&db).await?, 0);
        assert_eq!(discount_count(&db).await?, 0);

        let unchanged = customer::require_customer(&db, customer.id).await?;
        assert_eq!(unchanged.current_balance, 50.0);
        assert_eq!(unchanged.total_purchases, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_redemption_cap() -> Result<()> {
        let (db, customer, store) = setup_with_customer(1000.0).await?;
        let settings = LoyaltySettings::default();

        // 20% of 999 is 199.8, floored to 199
        assert_eq!(redemption_cap(999.0, &settings), 199.0);

        let result = post_transaction(&db, &settings, purchase(customer.id, store.id, 999.0, 200.0, 0.0)).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::LimitExceeded { requested, cap } if requested == 200.0 && cap == 199.0
        ));
        assert_eq!(entry_count(&db).await?, 0);

        let result = post_transaction(&db, &settings, purchase(customer.id, store.id, 999.0, 199.0, 0.0)).await?;
        assert_eq!(result.new_balance, 801.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_customer_and_store() -> Result<()> {
        let (db, customer, store) = setup_with_customer(100.0).await?;
        let settings = LoyaltySettings::default();

        let result = post_transaction(&db, &settings, purchase(customer.id + 100, store.id, 100.0, 0.0, 4.0)).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { entity: "customer", .. }));

        let result = post_transaction(&db, &settings, purchase(customer.id, store.id + 100, 100.0, 0.0, 4.0)).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { entity: "store", .. }));

        assert_eq!(entry_count(&db).await?, 0);
        assert_eq!(customer::require_customer(&db, customer.id).await?.total_purchases, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_metadata_is_stored_on_every_entry() -> Result<()> {
        let (db, customer, store) = setup_with_customer(500.0).await?;
        let mut request = purchase(customer.id, store.id, 1000.0, 100.0, 40.0);
        request.metadata = Some(TransactionMetadata {
            cashier_name: Some("Olga".to_string()),
            receipt_number: Some("R-17".to_string()),
            ..Default::default()
        });

        let result = post_transaction(&db, &LoyaltySettings::default(), request).await?;
        for id in result.ledger_entry_ids {
            let entry = ledger::get_entry_by_id(&db, id).await?.unwrap();
            let metadata = TransactionMetadata::decode(&entry)?.unwrap();
            assert_eq!(metadata.cashier_name.as_deref(), Some("Olga"));
            assert_eq!(metadata.receipt_number.as_deref(), Some("R-17"));
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_purchases_apply_every_delta() -> Result<()> {
        let (db, customer, store) = setup_with_customer(100.0).await?;
        let settings = LoyaltySettings::default();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let db = db.clone();
            let settings = settings.clone();
            let request = purchase(customer.id, store.id, 1000.0, 10.0, 5.0);
            handles.push(tokio::spawn(async move {
                post_transaction(&db, &settings, request).await
            }));
        }
        for handle in handles {
            handle.await.unwrap()?;
        }

        let updated = customer::require_customer(&db, customer.id).await?;
        assert_eq!(updated.current_balance, 50.0);
        assert_eq!(updated.total_purchases, 10);
        assert_eq!(updated.total_saved, 100.0);
        assert_eq!(entry_count(&db).await?, 20);
        assert_eq!(discount_count(&db).await?, 10);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_purchases_on_pooled_file_database() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let db = setup_file_db(dir.path(), 8).await?;
        let customer = create_test_customer(&db, 1000.0).await?;
        let store = create_test_store(&db, "Test Store").await?;
        let settings = LoyaltySettings::default();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            let settings = settings.clone();
            let request = purchase(customer.id, store.id, 1000.0, 10.0, 5.0);
            handles.push(tokio::spawn(async move {
                post_transaction(&db, &settings, request).await
            }));
        }
        for handle in handles {
            handle.await.unwrap()?;
        }

        let updated = customer::require_customer(&db, customer.id).await?;
        assert_eq!(updated.current_balance, 900.0);
        assert_eq!(updated.total_purchases, 20);
        assert_eq!(updated.total_saved, 200.0);
        assert_eq!(entry_count(&db).await?, 40);
        assert_eq!(discount_count(&db).await?, 20);

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_redemptions_never_overdraw() -> Result<()> {
        let (db, customer, store) = setup_with_customer(100.0).await?;
        let settings = LoyaltySettings::default();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let db = db.clone();
            let settings = settings.clone();
            let request = purchase(customer.id, store.id, 1000.0, 30.0, 0.0);
            handles.push(tokio::spawn(async move {
                post_transaction(&db, &settings, request).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert!(matches!(err, Error::InsufficientBalance { .. })),
            }
        }

        assert_eq!(succeeded, 3);
        let updated = customer::require_customer(&db, customer.id).await?;
        assert_eq!(updated.current_balance, 10.0);
        assert_eq!(
            LedgerEntry::find()
                .filter(ledger_entry::Column::Kind.eq(EntryKind::Spend))
                .count(&db)
                .await?,
            3
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_available_balance_subtracts_unswept_points() -> Result<()> {
        let (db, customer, store) = setup_with_customer(150.0).await?;
        let now = Utc::now();
        insert_test_entry(&db, customer.id, store.id, EntryKind::Earn, 100.0, now - Duration::days(46)).await?;
        insert_test_entry(&db, customer.id, store.id, EntryKind::Earn, 50.0, now - Duration::days(1)).await?;

        let balance = available_balance_at(&db, customer.id, 45, now).await?;
        assert_eq!(balance.cached_balance, 150.0);
        assert_eq!(balance.expired_not_yet_swept, 100.0);
        assert_eq!(balance.available, 50.0);
        assert!(balance.needs_sync);

        // Floors at zero when the cached value is already lower
        let floored = available_balance_for(&db, customer.id, 30.0, 45, now).await?;
        assert_eq!(floored.available, 0.0);

        // Read-only
        assert_eq!(customer::require_customer(&db, customer.id).await?.current_balance, 150.0);

        let missing = available_balance_at(&db, customer.id + 1, 45, now).await;
        assert!(matches!(missing.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_available_balance_in_sync() -> Result<()> {
        let (db, customer, store) = setup_with_customer(40.0).await?;
        let now = Utc::now();
        insert_test_entry(&db, customer.id, store.id, EntryKind::Earn, 40.0, now - Duration::days(2)).await?;

        let balance = available_balance_at(&db, customer.id, 45, now).await?;
        assert_eq!(balance.available, 40.0);
        assert_eq!(balance.expired_not_yet_swept, 0.0);
        assert!(!balance.needs_sync);

        Ok(())
    }
}
