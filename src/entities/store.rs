//! Store entity - Points of sale that transactions are attributed to.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Store database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    /// Unique identifier for the store
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Store name shown on receipts and in history
    pub name: String,
    /// Town or city
    pub city: Option<String>,
    /// Whether the store currently trades
    pub is_active: bool,
}

/// Defines relationships between Store and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One store has many ledger entries
    #[sea_orm(has_many = "super::ledger_entry::Entity")]
    LedgerEntries,
    /// One store has many pending discounts
    #[sea_orm(has_many = "super::pending_discount::Entity")]
    PendingDiscounts,
}

impl Related<super::ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl Related<super::pending_discount::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PendingDiscounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
