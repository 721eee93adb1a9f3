use crate::domain::money::Currency;
use crate::error::{CheckoutError, Result};
use rust_decimal::Decimal;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Policy knobs for checkout and renewals.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutConfig {
    pub currency: Currency,
    /// Flat tax applied on top of the cart total, in `[0, 1)`.
    pub tax_rate: Decimal,
    /// Consecutive failed renewals after which a subscription is paused.
    pub renewal_failure_threshold: u32,
    /// Shared secret for provider webhook signatures. Webhooks are rejected without one.
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: i64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            tax_rate: Decimal::ZERO,
            renewal_failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            webhook_secret: None,
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }
}

impl CheckoutConfig {
    /// Reads `CARTFLOW_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(code) = lookup("CARTFLOW_CURRENCY") {
            config.currency = Currency::new(&code)?;
        }
        if let Some(rate) = lookup("CARTFLOW_TAX_RATE") {
            config.tax_rate = rate.trim().parse().map_err(|_| {
                CheckoutError::InvalidArgument(format!("CARTFLOW_TAX_RATE is not a decimal: {rate}"))
            })?;
        }
        if let Some(threshold) = lookup("CARTFLOW_RENEWAL_FAILURE_THRESHOLD") {
            config.renewal_failure_threshold = threshold.trim().parse().map_err(|_| {
                CheckoutError::InvalidArgument(format!(
                    "CARTFLOW_RENEWAL_FAILURE_THRESHOLD is not an integer: {threshold}"
                ))
            })?;
        }
        config.webhook_secret = lookup("CARTFLOW_WEBHOOK_SECRET").filter(|s| !s.is_empty());

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tax_rate < Decimal::ZERO || self.tax_rate >= Decimal::ONE {
            return Err(CheckoutError::InvalidArgument(format!(
                "tax rate must be in [0, 1), got {}",
                self.tax_rate
            )));
        }
        if self.renewal_failure_threshold == 0 {
            return Err(CheckoutError::InvalidArgument(
                "renewal failure threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
