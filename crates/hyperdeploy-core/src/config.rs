//! Admin Config Store
//!
//! Mutable runtime settings (deploy price, upload size limit, timeouts,
//! feature toggles) persisted to `data/admin_config.json`. Last writer wins;
//! there is exactly one recognized set of keys and no versioning.
//!
//! Price policy: an invalid price (zero or negative) is rejected at write
//! time. The read path only falls back to the default when the on-disk file
//! itself carries an invalid value (e.g. hand-edited), and logs a warning
//! when it does.

use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::store::write_json_atomic;

/// Default deploy price in BRL
pub const DEFAULT_DEPLOY_PRICE: Decimal = dec!(10.00);

fn default_deploy_price() -> Decimal {
    DEFAULT_DEPLOY_PRICE
}

fn default_max_file_size_mb() -> u64 {
    25
}

fn default_timeout_minutes() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

/// Recognized admin settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Price charged per deploy
    #[serde(default = "default_deploy_price")]
    pub deploy_price: Decimal,

    /// Maximum accepted archive size in megabytes
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Minutes before an open ticket expires
    #[serde(default = "default_timeout_minutes")]
    pub ticket_timeout_minutes: i64,

    /// Minutes before an unpaid payment expires
    #[serde(default = "default_timeout_minutes")]
    pub payment_timeout_minutes: i64,

    /// Start the application automatically after a successful deploy
    #[serde(default = "default_true")]
    pub auto_deploy: bool,

    /// Whether the Mercado Pago gateway is enabled
    #[serde(default = "default_true")]
    pub mercadopago_enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            deploy_price: default_deploy_price(),
            max_file_size_mb: default_max_file_size_mb(),
            ticket_timeout_minutes: default_timeout_minutes(),
            payment_timeout_minutes: default_timeout_minutes(),
            auto_deploy: true,
            mercadopago_enabled: true,
        }
    }
}

/// Flat-file settings store with in-memory snapshot
pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<AdminConfig>,
}

impl ConfigStore {
    /// Open the config store, writing defaults when the file is missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let config = if path.exists() {
            Self::load_file(&path)?
        } else {
            let defaults = AdminConfig::default();
            write_json_atomic(&path, &defaults)?;
            defaults
        };

        Ok(Self {
            path,
            config: RwLock::new(config),
        })
    }

    fn load_file(path: &PathBuf) -> Result<AdminConfig> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))
    }

    fn persist(&self, config: &AdminConfig) -> Result<()> {
        write_json_atomic(&self.path, config)
    }

    /// Re-read the settings from disk, replacing the in-memory snapshot
    pub fn reload(&self) -> Result<()> {
        let fresh = Self::load_file(&self.path)?;
        *self.config.write().unwrap() = fresh;
        tracing::info!("Admin config reloaded");
        Ok(())
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> AdminConfig {
        self.config.read().unwrap().clone()
    }

    fn guarded_price(price: Decimal) -> Decimal {
        if price <= Decimal::ZERO {
            tracing::warn!(%price, "Invalid deploy price on disk, using default");
            DEFAULT_DEPLOY_PRICE
        } else {
            price
        }
    }

    /// Current deploy price
    pub fn deploy_price(&self) -> Decimal {
        Self::guarded_price(self.config.read().unwrap().deploy_price)
    }

    /// Deploy price read straight from disk, bypassing the snapshot.
    ///
    /// Used at charge time so an admin edit between ticks is honored.
    pub fn fresh_deploy_price(&self) -> Decimal {
        match Self::load_file(&self.path) {
            Ok(config) => Self::guarded_price(config.deploy_price),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read fresh deploy price");
                self.deploy_price()
            }
        }
    }

    /// Set the deploy price. Rejects zero and negative values.
    pub fn set_deploy_price(&self, price: Decimal) -> Result<()> {
        if price <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "deploy price must be greater than zero, got {price}"
            )));
        }

        let mut config = self.config.write().unwrap();
        config.deploy_price = price;
        self.persist(&config)?;
        tracing::info!(%price, "Deploy price updated");
        Ok(())
    }

    /// Maximum archive size in megabytes
    pub fn max_file_size_mb(&self) -> u64 {
        self.config.read().unwrap().max_file_size_mb
    }

    /// Maximum archive size in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb() * 1024 * 1024
    }

    /// Set the maximum archive size in megabytes
    pub fn set_max_file_size_mb(&self, size_mb: u64) -> Result<()> {
        let mut config = self.config.write().unwrap();
        config.max_file_size_mb = size_mb;
        self.persist(&config)?;
        tracing::info!(size_mb, "Max file size updated");
        Ok(())
    }

    /// Ticket expiry timeout
    pub fn ticket_timeout(&self) -> Duration {
        Duration::minutes(self.config.read().unwrap().ticket_timeout_minutes)
    }

    /// Set the ticket expiry timeout in minutes
    pub fn set_ticket_timeout_minutes(&self, minutes: i64) -> Result<()> {
        let mut config = self.config.write().unwrap();
        config.ticket_timeout_minutes = minutes;
        self.persist(&config)?;
        tracing::info!(minutes, "Ticket timeout updated");
        Ok(())
    }

    /// Payment expiry timeout
    pub fn payment_timeout(&self) -> Duration {
        Duration::minutes(self.config.read().unwrap().payment_timeout_minutes)
    }

    /// Set the payment expiry timeout in minutes
    pub fn set_payment_timeout_minutes(&self, minutes: i64) -> Result<()> {
        let mut config = self.config.write().unwrap();
        config.payment_timeout_minutes = minutes;
        self.persist(&config)?;
        tracing::info!(minutes, "Payment timeout updated");
        Ok(())
    }

    /// Whether applications are started automatically after deploy
    pub fn auto_deploy(&self) -> bool {
        self.config.read().unwrap().auto_deploy
    }

    /// Toggle automatic start after deploy
    pub fn set_auto_deploy(&self, enabled: bool) -> Result<()> {
        let mut config = self.config.write().unwrap();
        config.auto_deploy = enabled;
        self.persist(&config)?;
        tracing::info!(enabled, "Auto deploy toggled");
        Ok(())
    }

    /// Whether the Mercado Pago gateway is enabled
    pub fn mercadopago_enabled(&self) -> bool {
        self.config.read().unwrap().mercadopago_enabled
    }

    /// Toggle the Mercado Pago gateway
    pub fn set_mercadopago_enabled(&self, enabled: bool) -> Result<()> {
        let mut config = self.config.write().unwrap();
        config.mercadopago_enabled = enabled;
        self.persist(&config)?;
        tracing::info!(enabled, "Mercado Pago toggled");
        Ok(())
    }

    /// Reset every setting to its default and persist
    pub fn reset_to_default(&self) -> Result<()> {
        let mut config = self.config.write().unwrap();
        *config = AdminConfig::default();
        self.persist(&config)?;
        tracing::info!("Admin config reset to defaults");
        Ok(())
    }
}
