//! Core business logic - framework-agnostic loyalty operations.
//!
//! Nothing in here knows about Discord. Every function takes a database
//! connection (or an open storage transaction) and plain values, so the
//! operator console, the scheduler and the tests drive the same code.

/// Balance engine: posting purchases and read-side balance reconciliation
pub mod balance;
/// Injected time source
pub mod clock;
/// Customer directory lookups and registration
pub mod customer;
/// Expiration sweeper
pub mod expiration;
/// Ledger store queries
pub mod ledger;
/// Best-effort purchase notifications
pub mod notify;
/// Pending discount queue for point-of-sale agents
pub mod pending_discount;
/// Retention cutoffs
pub mod retention;
/// Effective loyalty settings and their cache
pub mod settings;
/// Store lookup
pub mod store;
