//! Loyalty settings - operator overrides and the read-through settings cache.
//!
//! The configured [`LoyaltySettings`] are the baseline. Operators may store an
//! override row in `loyalty_settings`; the most recently updated row wins.
//! [`SettingsCache`] is the explicit, owned cache the balance engine and the
//! scheduler read through, refreshed after a TTL measured on an injected clock.

use crate::{
    config::LoyaltySettings,
    core::clock::Clock,
    entities::{LoyaltySettingsRecord, loyalty_settings},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Default time a cached settings value is served before reloading.
pub const DEFAULT_SETTINGS_TTL_SECS: i64 = 60;

/// Converts a stored override row into validated settings.
fn settings_from_record(record: &loyalty_settings::Model) -> Result<LoyaltySettings> {
    let expiry_days = u32::try_from(record.expiry_days).map_err(|_| Error::Config {
        message: format!("stored expiry_days must be non-negative, got {}", record.expiry_days),
    })?;
    let pending_discount_expiry_secs =
        u32::try_from(record.pending_discount_expiry_secs).map_err(|_| Error::Config {
            message: format!(
                "stored pending_discount_expiry_secs out of range: {}",
                record.pending_discount_expiry_secs
            ),
        })?;

    let settings = LoyaltySettings {
        max_discount_percent: record.max_discount_percent,
        expiry_days,
        pending_discount_expiry_secs,
        min_redemption_amount: record.min_redemption_amount,
    };
    settings.validate()?;
    Ok(settings)
}

/// Loads the effective settings: the newest override row, or `defaults`.
pub async fn load_settings<C>(db: &C, defaults: &LoyaltySettings) -> Result<LoyaltySettings>
where
    C: ConnectionTrait,
{
    let record = LoyaltySettingsRecord::find()
        .order_by_desc(loyalty_settings::Column::UpdatedAt)
        .order_by_desc(loyalty_settings::Column::Id)
        .one(db)
        .await?;

    match record {
        Some(record) => settings_from_record(&record),
        None => Ok(defaults.clone()),
    }
}

/// Stores a new override row. Readers pick it up after their cache expires.
pub async fn save_settings(db: &DatabaseConnection, settings: &LoyaltySettings) -> Result<()> {
    settings.validate()?;

    let record = loyalty_settings::ActiveModel {
        max_discount_percent: Set(settings.max_discount_percent),
        expiry_days: Set(i32::try_from(settings.expiry_days).map_err(|_| Error::Config {
            message: format!("expiry_days too large: {}", settings.expiry_days),
        })?),
        pending_discount_expiry_secs: Set(i64::from(settings.pending_discount_expiry_secs)),
        min_redemption_amount: Set(settings.min_redemption_amount),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    record.insert(db).await?;
    info!(?settings, "Loyalty settings override stored");
    Ok(())
}

/// Read-through cache of the effective settings with time-based invalidation.
pub struct SettingsCache {
    db: DatabaseConnection,
    defaults: LoyaltySettings,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<(LoyaltySettings, DateTime<Utc>)>>,
}

impl SettingsCache {
    /// Creates an empty cache; the first [`get`](Self::get) loads from storage.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        defaults: LoyaltySettings,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            defaults,
            ttl,
            clock,
            slot: RwLock::new(None),
        }
    }

    /// Returns the cached settings, reloading them once the TTL has elapsed.
    pub async fn get(&self) -> Result<LoyaltySettings> {
        let now = self.clock.now();
        {
            let slot = self.slot.read().await;
            if let Some((settings, expires_at)) = slot.as_ref() {
                if now < *expires_at {
                    return Ok(settings.clone());
                }
            }
        }

        let mut slot = self.slot.write().await;
        // Another task may have refreshed while we waited for the write lock
        if let Some((settings, expires_at)) = slot.as_ref() {
            if now < *expires_at {
                return Ok(settings.clone());
            }
        }

        let settings = load_settings(&self.db, &self.defaults).await?;
        debug!(?settings, "Settings cache refreshed");
        *slot = Some((settings.clone(), now + self.ttl));
        Ok(settings)
    }

    /// Drops the cached value so the next [`get`](Self::get) reloads.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
        debug!("Settings cache invalidated");
    }
}
