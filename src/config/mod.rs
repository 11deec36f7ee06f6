/// Database configuration and connection management
pub mod database;

/// Loyalty and scheduler configuration loading from config.toml
pub mod loyalty;

pub use loyalty::{Config, LoyaltySettings, SchedulerConfig, load_config, load_default_config};
