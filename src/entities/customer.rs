//! Customer entity - One row per loyalty member.
//!
//! Holds the member's identity, the cached point balance, and lifetime statistics.
//! The balance and statistics are written only by the balance engine and the
//! expiration sweeper; registration and soft-disable are handled elsewhere.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Customer database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    /// Internal member id
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Immutable external messaging reference (chat id)
    #[sea_orm(unique)]
    pub chat_id: i64,
    /// Printed loyalty card number, if one was issued
    #[sea_orm(unique)]
    pub card_number: Option<String>,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: Option<String>,
    /// Cached running point balance
    pub current_balance: f64,
    /// Lifetime number of purchases posted
    pub total_purchases: i64,
    /// Lifetime amount saved through redemptions
    pub total_saved: f64,
    /// When the member registered
    pub registration_date: DateTimeUtc,
    /// Last balance-affecting activity
    pub last_activity: DateTimeUtc,
    /// Soft-disable flag owned by the registration side
    pub is_active: bool,
}

impl Model {
    /// Display name used in operator output and notifications.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.trim().is_empty() => format!("{} {}", self.first_name, last.trim()),
            _ => self.first_name.clone(),
        }
    }
}

/// Defines relationships between Customer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One customer has many ledger entries
    #[sea_orm(has_many = "super::ledger_entry::Entity")]
    LedgerEntries,
}

impl Related<super::ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
