//! Loyalty configuration loading from config.toml
//!
//! The business constants (maximum discount share, point lifetime, pending
//! discount window) and the sweep schedule are read once at startup into plain
//! value objects and handed to the components that need them. Every field has a
//! default, so an empty or missing file yields the standard programme.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Default point lifetime in days.
pub const DEFAULT_EXPIRY_DAYS: u32 = crate::core::retention::RETENTION_DAYS;
/// Default maximum share of a check payable with points, in percent.
pub const DEFAULT_MAX_DISCOUNT_PERCENT: f64 = 20.0;
/// Default pending discount window in seconds.
pub const DEFAULT_PENDING_DISCOUNT_EXPIRY_SECS: u32 = 90;
/// Default smallest non-zero redemption.
pub const DEFAULT_MIN_REDEMPTION_AMOUNT: f64 = 1.0;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Business constants of the loyalty programme
    pub loyalty: LoyaltySettings,
    /// Expiration sweep schedule
    pub scheduler: SchedulerConfig,
}

/// Business constants consumed by the balance engine, the sweeper and the
/// pending discount queue.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoyaltySettings {
    /// Largest share of a check that may be paid with points, in percent
    pub max_discount_percent: f64,
    /// Days an earned point stays spendable
    pub expiry_days: u32,
    /// Seconds a pending discount stays claimable by the point-of-sale agent
    pub pending_discount_expiry_secs: u32,
    /// Smallest non-zero redemption accepted
    pub min_redemption_amount: f64,
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        Self {
            max_discount_percent: DEFAULT_MAX_DISCOUNT_PERCENT,
            expiry_days: DEFAULT_EXPIRY_DAYS,
            pending_discount_expiry_secs: DEFAULT_PENDING_DISCOUNT_EXPIRY_SECS,
            min_redemption_amount: DEFAULT_MIN_REDEMPTION_AMOUNT,
        }
    }
}

impl LoyaltySettings {
    /// Checks that every constant is usable.
    ///
    /// A failure here is a startup configuration error, never a runtime one.
    pub fn validate(&self) -> Result<()> {
        if !self.max_discount_percent.is_finite()
            || self.max_discount_percent < 0.0
            || self.max_discount_percent > 100.0
        {
            return Err(Error::Config {
                message: format!(
                    "max_discount_percent must be between 0 and 100, got {}",
                    self.max_discount_percent
                ),
            });
        }
        if !self.min_redemption_amount.is_finite() || self.min_redemption_amount < 0.0 {
            return Err(Error::Config {
                message: format!(
                    "min_redemption_amount must be a non-negative number, got {}",
                    self.min_redemption_amount
                ),
            });
        }
        Ok(())
    }

    /// Maximum discount as a fraction of the check amount (0.2 for 20%).
    #[must_use]
    pub fn max_discount_fraction(&self) -> f64 {
        self.max_discount_percent / 100.0
    }

    /// Pending discount window as a chrono duration.
    #[must_use]
    pub fn pending_discount_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.pending_discount_expiry_secs))
    }
}

/// Schedule of the background expiration sweep.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether the background sweep runs at all
    pub enabled: bool,
    /// Hours between two sweeps
    pub interval_hours: u64,
    /// Report what would expire without writing anything
    pub dry_run: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 24,
            dry_run: false,
        }
    }
}

impl SchedulerConfig {
    /// Interval between sweeps; never shorter than one hour.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.max(1) * 3600)
    }
}

/// Loads the configuration from a TOML file and validates it.
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid or a value has the wrong type (e.g. negative days)
/// - A constant fails [`LoyaltySettings::validate`]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Parses and validates configuration text.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.loyalty.validate()?;
    Ok(config)
}

/// Loads the configuration from `LOYALTY_CONFIG` (default `./config.toml`).
///
/// A missing file is not an error: the defaults apply and a warning is logged.
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var("LOYALTY_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        warn!("Config file {} not found, using defaults", path);
        return Ok(Config::default());
    }
    load_config(path)
}
