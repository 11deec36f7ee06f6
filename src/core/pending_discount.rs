//! Pending discount queue - handoff of committed redemptions to store terminals.
//!
//! The balance engine creates one discount per redemption. A point-of-sale
//! agent polls [`list_pending`], claims a discount by moving it to
//! `processing`, and reports `applied` or `failed`. Expiry is lazy: a discount
//! whose `expires_at` has passed reads as `expired` whatever its stored status,
//! and nothing here retries or recreates it.
//!
//! Every status change is a compare-and-set on the stored status, so two agents
//! racing for the same discount cannot both claim it.

use crate::{
    entities::{DiscountStatus, PendingDiscount, pending_discount},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{Condition, QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{debug, info, warn};

/// Queues a discount for the terminal of `store_id`. Only the balance engine
/// calls this, inside the transaction that wrote the spend entry.
pub async fn create_pending_discount<C>(
    db: &C,
    store_id: i64,
    ledger_entry_id: i64,
    discount_amount: f64,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<pending_discount::Model>
where
    C: ConnectionTrait,
{
    if !discount_amount.is_finite() || discount_amount <= 0.0 {
        return Err(Error::invalid(
            "discount_amount",
            format!("must be a positive number, got {discount_amount}"),
        ));
    }

    let model = pending_discount::ActiveModel {
        store_id: Set(store_id),
        ledger_entry_id: Set(ledger_entry_id),
        discount_amount: Set(discount_amount),
        status: Set(DiscountStatus::Pending),
        created_at: Set(now),
        applied_at: Set(None),
        expires_at: Set(now + window),
        error_message: Set(None),
        ..Default::default()
    };

    let created = model.insert(db).await?;
    debug!(
        discount_id = created.id,
        store_id,
        ledger_entry_id,
        discount_amount,
        expires_at = %created.expires_at,
        "Pending discount queued"
    );
    Ok(created)
}

/// Status a reader must act on: `expired` once `now` reaches `expires_at`.
#[must_use]
pub fn effective_status(discount: &pending_discount::Model, now: DateTime<Utc>) -> DiscountStatus {
    if now >= discount.expires_at {
        DiscountStatus::Expired
    } else {
        discount.status
    }
}

/// Returns the discount with its status replaced by the effective one.
fn as_seen_at(mut discount: pending_discount::Model, now: DateTime<Utc>) -> pending_discount::Model {
    discount.status = effective_status(&discount, now);
    discount
}

/// Retrieves a discount as a reader sees it now.
pub async fn get_pending_discount(
    db: &DatabaseConnection,
    discount_id: i64,
) -> Result<Option<pending_discount::Model>> {
    get_pending_discount_at(db, discount_id, Utc::now()).await
}

/// [`get_pending_discount`] as of `now`.
pub async fn get_pending_discount_at(
    db: &DatabaseConnection,
    discount_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<pending_discount::Model>> {
    let discount = PendingDiscount::find_by_id(discount_id).one(db).await?;
    Ok(discount.map(|d| as_seen_at(d, now)))
}

/// Discounts of one store, oldest first, optionally filtered by effective status.
pub async fn list_pending(
    db: &DatabaseConnection,
    store_id: i64,
    status: Option<DiscountStatus>,
) -> Result<Vec<pending_discount::Model>> {
    list_pending_at(db, store_id, status, Utc::now()).await
}

/// [`list_pending`] as of `now`.
pub async fn list_pending_at(
    db: &DatabaseConnection,
    store_id: i64,
    status: Option<DiscountStatus>,
    now: DateTime<Utc>,
) -> Result<Vec<pending_discount::Model>> {
    let mut query = PendingDiscount::find().filter(pending_discount::Column::StoreId.eq(store_id));

    query = match status {
        None => query,
        Some(DiscountStatus::Expired) => query.filter(
            Condition::any()
                .add(pending_discount::Column::Status.eq(DiscountStatus::Expired))
                .add(pending_discount::Column::ExpiresAt.lte(now)),
        ),
        Some(status) => query
            .filter(pending_discount::Column::Status.eq(status))
            .filter(pending_discount::Column::ExpiresAt.gt(now)),
    };

    let discounts = query
        .order_by_asc(pending_discount::Column::CreatedAt)
        .order_by_asc(pending_discount::Column::Id)
        .all(db)
        .await?;

    Ok(discounts.into_iter().map(|d| as_seen_at(d, now)).collect())
}

fn invalid_transition(from: DiscountStatus, to: DiscountStatus) -> Error {
    Error::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Moves a discount to `new_status` as of now. See [`transition_at`].
pub async fn transition(
    db: &DatabaseConnection,
    discount_id: i64,
    new_status: DiscountStatus,
    error_message: Option<String>,
) -> Result<pending_discount::Model> {
    transition_at(db, discount_id, new_status, error_message, Utc::now()).await
}

/// Moves a discount to `new_status` as of `now`.
///
/// Allowed: `pending -> processing`, `processing -> applied`,
/// `processing -> failed` (with a non-empty `error_message`), and any stored
/// status except `expired` to `expired` once the expiry instant has passed.
/// Everything else, including any move out of an effectively expired
/// discount, fails with `InvalidTransition`.
pub async fn transition_at(
    db: &DatabaseConnection,
    discount_id: i64,
    new_status: DiscountStatus,
    error_message: Option<String>,
    now: DateTime<Utc>,
) -> Result<pending_discount::Model> {
    let error_message = error_message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    if new_status == DiscountStatus::Failed && error_message.is_none() {
        return Err(Error::invalid(
            "error_message",
            "a failed discount needs a reason",
        ));
    }

    let discount = PendingDiscount::find_by_id(discount_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("pending discount", discount_id))?;

    let stored = discount.status;
    let effective = effective_status(&discount, now);

    let allowed = match (effective, new_status) {
        (DiscountStatus::Expired, DiscountStatus::Expired) => stored != DiscountStatus::Expired,
        (DiscountStatus::Pending, DiscountStatus::Processing)
        | (DiscountStatus::Processing, DiscountStatus::Applied | DiscountStatus::Failed) => true,
        _ => false,
    };
    if !allowed {
        return Err(invalid_transition(effective, new_status));
    }

    let mut update = PendingDiscount::update_many()
        .col_expr(pending_discount::Column::Status, Expr::value(new_status))
        .filter(pending_discount::Column::Id.eq(discount_id))
        .filter(pending_discount::Column::Status.eq(stored));

    match new_status {
        DiscountStatus::Expired => {
            update = update.filter(pending_discount::Column::ExpiresAt.lte(now));
        }
        DiscountStatus::Applied => {
            update = update
                .col_expr(pending_discount::Column::AppliedAt, Expr::value(now))
                .filter(pending_discount::Column::ExpiresAt.gt(now));
        }
        DiscountStatus::Failed => {
            update = update
                .col_expr(
                    pending_discount::Column::ErrorMessage,
                    Expr::value(error_message.clone()),
                )
                .filter(pending_discount::Column::ExpiresAt.gt(now));
        }
        DiscountStatus::Pending | DiscountStatus::Processing => {
            update = update.filter(pending_discount::Column::ExpiresAt.gt(now));
        }
    }

    let result = update.exec(db).await?;

    let current = PendingDiscount::find_by_id(discount_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("pending discount", discount_id))?;

    if result.rows_affected == 0 {
        // Lost the race against another status change
        let seen = effective_status(&current, now);
        warn!(
            discount_id,
            from = %seen,
            to = %new_status,
            "Pending discount changed concurrently, transition rejected"
        );
        return Err(invalid_transition(seen, new_status));
    }

    info!(
        discount_id,
        store_id = current.store_id,
        from = %stored,
        to = %new_status,
        error_message = current.error_message.as_deref(),
        "Pending discount transitioned"
    );
    Ok(current)
}
