//! Ledger entry entity - One row per point-affecting event.
//!
//! Rows are append-only. The only column that ever changes after insert is
//! `expiry_marker`, which moves once from `None` to [`EXPIRED_MARKER`] when the
//! sweeper expires an `earn` row. `created_at` is server-assigned and never
//! rewritten, so the set of unexpired earn rows can be rebuilt for any past instant.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Marker written by the expiration sweeper.
pub const EXPIRED_MARKER: &str = "expired";

/// Direction of a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Points credited to the customer
    #[sea_orm(string_value = "earn")]
    Earn,
    /// Points redeemed by the customer
    #[sea_orm(string_value = "spend")]
    Spend,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Earn => f.write_str("earn"),
            Self::Spend => f.write_str("spend"),
        }
    }
}

/// Ledger entry database model (table `transactions`)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning customer
    pub customer_id: i64,
    /// Store the purchase happened at
    pub store_id: Option<i64>,
    /// Human-readable title for history views
    pub title: String,
    /// `earn` or `spend`
    pub kind: EntryKind,
    /// Points credited (earn) or redeemed (spend); always non-negative
    pub amount: f64,
    /// Check total of the purchase this entry belongs to
    pub check_amount: Option<f64>,
    /// Points redeemed by the purchase
    pub points_redeemed: Option<f64>,
    /// Points earned by the purchase
    pub points_earned: Option<f64>,
    /// `None` while live, [`EXPIRED_MARKER`] once swept
    pub expiry_marker: Option<String>,
    /// Store name captured at write time
    pub store_name: Option<String>,
    /// JSON-encoded [`crate::core::ledger::TransactionMetadata`]
    pub metadata: Option<String>,
    /// Server-assigned creation instant
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Whether the sweeper has already expired this entry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expiry_marker.as_deref() == Some(EXPIRED_MARKER)
    }
}

/// Defines relationships between a ledger entry and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    /// Each entry is attributed to at most one store
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id",
        on_delete = "SetNull"
    )]
    Store,
    /// A spend entry may be referenced by a pending discount
    #[sea_orm(has_many = "super::pending_discount::Entity")]
    PendingDiscounts,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::pending_discount::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PendingDiscounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
