//! Pending discount entity - Short-lived handoff records for point-of-sale agents.
//!
//! A row is created alongside every redemption and then polled by the agent at
//! the store, which walks it through `processing` to `applied` or `failed`.
//! Expiry is enforced lazily by readers, see [`crate::core::pending_discount`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle status of a pending discount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum DiscountStatus {
    /// Created, not yet picked up
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Picked up by the agent
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Applied at the terminal
    #[sea_orm(string_value = "applied")]
    Applied,
    /// The agent gave up, see `error_message`
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Past its expiry instant
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl DiscountStatus {
    /// Lowercase name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for DiscountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountStatus {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "applied" => Ok(Self::Applied),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            other => Err(crate::errors::Error::invalid(
                "status",
                format!("unknown discount status '{other}'"),
            )),
        }
    }
}

/// Pending discount database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pending_discounts")]
pub struct Model {
    /// Unique identifier for the discount
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Store whose terminal must apply the discount
    pub store_id: i64,
    /// Originating spend ledger entry
    pub ledger_entry_id: i64,
    /// Discount to apply, in currency units (one point per unit)
    pub discount_amount: f64,
    /// Stored status; see `effective_status` for what readers report
    pub status: DiscountStatus,
    /// When the discount was created
    pub created_at: DateTimeUtc,
    /// When the agent reported it applied
    pub applied_at: Option<DateTimeUtc>,
    /// Instant after which the discount is treated as expired
    pub expires_at: DateTimeUtc,
    /// Failure reason reported by the agent
    pub error_message: Option<String>,
}

/// Defines relationships between a pending discount and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each discount belongs to one store
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id",
        on_delete = "Cascade"
    )]
    Store,
    /// Each discount references the spend entry it was created for
    #[sea_orm(
        belongs_to = "super::ledger_entry::Entity",
        from = "Column::LedgerEntryId",
        to = "super::ledger_entry::Column::Id",
        on_delete = "Cascade"
    )]
    LedgerEntry,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
