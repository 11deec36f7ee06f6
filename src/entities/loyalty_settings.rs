//! Loyalty settings entity - Operator overrides of the business constants.
//!
//! The most recently updated row wins; when the table is empty the values from
//! `config.toml` apply.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Loyalty settings database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loyalty_settings")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Largest share of a check that may be paid with points, in percent
    pub max_discount_percent: f64,
    /// Days an earned point stays spendable
    pub expiry_days: i32,
    /// Seconds a pending discount stays claimable
    pub pending_discount_expiry_secs: i64,
    /// Smallest non-zero redemption accepted
    pub min_redemption_amount: f64,
    /// When this row was written
    pub updated_at: DateTimeUtc,
}

/// `LoyaltySettings` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
