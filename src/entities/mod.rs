//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod customer;
pub mod ledger_entry;
pub mod loyalty_settings;
pub mod pending_discount;
pub mod store;

// Re-export specific types to avoid conflicts
pub use customer::{Column as CustomerColumn, Entity as Customer, Model as CustomerModel};
pub use ledger_entry::{
    Column as LedgerEntryColumn, EntryKind, Entity as LedgerEntry, Model as LedgerEntryModel,
};
pub use loyalty_settings::{
    Column as LoyaltySettingsColumn, Entity as LoyaltySettingsRecord,
    Model as LoyaltySettingsModel,
};
pub use pending_discount::{
    Column as PendingDiscountColumn, DiscountStatus, Entity as PendingDiscount,
    Model as PendingDiscountModel,
};
pub use store::{Column as StoreColumn, Entity as Store, Model as StoreModel};
