//! Billing settings.
//!
//! TOML-deserializable settings with a default for every field, so an empty
//! document is a valid configuration.

use serde::Deserialize;

use crate::{
    error::{BillingError, Result},
    proration::ProrationEngine,
};

/// Largest supported rounding precision.
const MAX_PRECISION: u32 = 10;

/// Root billing configuration.
///
/// # Examples
///
/// ```
/// use recurring_billing::config::BillingConfig;
///
/// let config = BillingConfig::from_toml(
///     r#"
///     [currency]
///     default_code = "EUR"
///
///     [labels]
///     postpaid = "Billed later"
///     "#,
/// )
/// .unwrap();
///
/// assert_eq!(config.currency.default_code, "EUR");
/// assert_eq!(config.currency.precision, 2);
/// assert_eq!(config.labels.proration, "Proration");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BillingConfig {
    /// Currency settings.
    #[serde(default)]
    pub currency: CurrencyConfig,

    /// Adjustment labels.
    #[serde(default)]
    pub labels: LabelConfig,

    /// Renewal sweep settings.
    #[serde(default)]
    pub cron: CronConfig,
}

impl BillingConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidSettings`] if the document does not parse or a
    /// value is out of range.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| BillingError::InvalidSettings(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidSettings`] naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.currency.validate()?;
        self.labels.validate()?;
        self.cron.validate()
    }

    /// Builds a proration engine rounding to the configured precision.
    #[must_use]
    pub fn proration_engine(&self) -> ProrationEngine {
        ProrationEngine::new(self.currency.precision)
    }
}

/// Currency settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// ISO 4217 code used when an entity does not name one.
    pub default_code: String,

    /// Minor-unit digits for half-up rounding.
    pub precision: u32,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self { default_code: "USD".to_owned(), precision: 2 }
    }
}

impl CurrencyConfig {
    fn validate(&self) -> Result<()> {
        if self.default_code.len() != 3 || !self.default_code.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(BillingError::InvalidSettings(format!(
                "currency.default_code must be three uppercase letters, got '{}'",
                self.default_code
            )));
        }
        if self.precision > MAX_PRECISION {
            return Err(BillingError::InvalidSettings(format!(
                "currency.precision must be at most {MAX_PRECISION}, got {}",
                self.precision
            )));
        }
        Ok(())
    }
}

/// Labels for subscription adjustments on initial orders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Prepaid partial-period adjustment.
    pub proration: String,

    /// Trial zero-charge adjustment.
    pub free_trial: String,

    /// Postpaid zero-charge adjustment.
    pub postpaid: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            proration: "Proration".to_owned(),
            free_trial: "Free trial".to_owned(),
            postpaid: "Pay later".to_owned(),
        }
    }
}

impl LabelConfig {
    fn validate(&self) -> Result<()> {
        let labels = [
            ("proration", &self.proration),
            ("free_trial", &self.free_trial),
            ("postpaid", &self.postpaid),
        ];

        for (name, label) in labels {
            if label.trim().is_empty() {
                return Err(BillingError::InvalidSettings(format!("labels.{name} cannot be empty")));
            }
        }

        Ok(())
    }
}

/// Renewal sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CronConfig {
    /// Maximum number of orders handled per sweep.
    pub batch_size: usize,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

impl CronConfig {
    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BillingError::InvalidSettings("cron.batch_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = BillingConfig::from_toml("").unwrap();
        assert_eq!(config, BillingConfig::default());
        assert_eq!(config.labels.free_trial, "Free trial");
        assert_eq!(config.cron.batch_size, 100);
        assert_eq!(config.proration_engine().precision(), 2);
    }

    #[test]
    fn test_full_document() {
        let config = BillingConfig::from_toml(
            r#"
            [currency]
            default_code = "JPY"
            precision = 0

            [labels]
            proration = "Partial month"
            free_trial = "Trial"
            postpaid = "Invoiced later"

            [cron]
            batch_size = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.currency.default_code, "JPY");
        assert_eq!(config.currency.precision, 0);
        assert_eq!(config.labels.proration, "Partial month");
        assert_eq!(config.cron.batch_size, 25);
    }

    #[test]
    fn test_rejects_bad_currency_code() {
        let err = BillingConfig::from_toml("[currency]\ndefault_code = \"usd\"").unwrap_err();
        assert!(matches!(err, BillingError::InvalidSettings(_)));
    }

    #[test]
    fn test_rejects_excessive_precision() {
        assert!(BillingConfig::from_toml("[currency]\nprecision = 11").is_err());
    }

    #[test]
    fn test_rejects_empty_label() {
        let err = BillingConfig::from_toml("[labels]\nproration = \"  \"").unwrap_err();
        assert!(err.to_string().contains("labels.proration"));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        assert!(BillingConfig::from_toml("[cron]\nbatch_size = 0").is_err());
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            BillingConfig::from_toml("[currency"),
            Err(BillingError::InvalidSettings(_))
        ));
    }
}
