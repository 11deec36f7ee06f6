//! Unified error types for the loyalty ledger.
//!
//! Every fallible operation in the crate returns [`Result`]. Precondition
//! failures (`NotFound`, `InvalidArgument`, `InsufficientBalance`,
//! `LimitExceeded`, `InvalidTransition`) are raised before any write begins;
//! `Database` covers every storage failure, including a failed commit, after
//! which the storage transaction has already been rolled back.

use thiserror::Error;

/// All errors surfaced by the ledger, the sweeper, and the operator console.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced customer, store, ledger entry, or discount does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Malformed or out-of-range input (negative amounts, non-finite numbers).
    #[error("Invalid {field}: {message}")]
    InvalidArgument {
        /// Name of the offending input
        field: &'static str,
        /// Human-readable reason
        message: String,
    },

    /// Redemption exceeds the customer's current balance.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Points the caller asked to redeem
        required: f64,
        /// Points currently on the customer's balance
        available: f64,
    },

    /// Redemption exceeds the configured maximum-discount share of the check.
    #[error("Redemption of {requested} points exceeds the maximum of {cap} for this check")]
    LimitExceeded {
        /// Points the caller asked to redeem
        requested: f64,
        /// Largest redemption allowed for this check amount
        cap: f64,
    },

    /// A pending discount cannot move between the given statuses.
    #[error("Invalid discount status transition: {from} -> {to}")]
    InvalidTransition {
        /// Effective status at the time of the request
        from: String,
        /// Requested status
        to: String,
    },

    /// Storage failure; the surrounding transaction has been rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Invalid or unreadable configuration. Fatal at startup.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable reason
        message: String,
    },

    /// Transaction metadata could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A notification could not be delivered.
    #[error("Notification error: {message}")]
    Notification {
        /// Human-readable reason
        message: String,
    },

    /// Serenity/Poise framework error.
    #[error("Discord framework error: {0}")]
    Discord(Box<poise::serenity_prelude::Error>),

    /// Environment variable error.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Discord(Box::new(value))
    }
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] with any displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for an [`Error::InvalidArgument`].
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
