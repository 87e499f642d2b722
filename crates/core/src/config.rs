use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::{CapabilityRegistry, MerchantCapability, MerchantProfile};
use crate::domain::discount::{DiscountDefinition, DiscountKind};
use crate::domain::fulfillment::{FulfillmentOption, FulfillmentOptionId};
use crate::domain::payment::{PaymentHandler, PaymentHandlerId};

/// Environment variable consulted for a config file path when none is given
/// explicitly.
pub const CONFIG_PATH_ENV: &str = "CARTWRIGHT_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub store: StoreIdentity,
    pub tax: TaxConfig,
    pub payment: PaymentConfig,
    pub fulfillment: FulfillmentConfig,
    pub discounts: Vec<DiscountDefinition>,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreIdentity {
    pub name: String,
    pub currency: String,
    /// Base URL used to mint order permalinks.
    pub permalink_base: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxConfig {
    /// Flat tax rate in basis points, applied when a destination address is
    /// set. 1000 = 10%.
    pub rate_bps: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub handlers: Vec<PaymentHandler>,
    pub authorization_timeout_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FulfillmentConfig {
    pub options: Vec<FulfillmentOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for StoreIdentity {
    fn default() -> Self {
        Self {
            name: "Cartwright Mock Store".to_owned(),
            currency: "USD".to_owned(),
            permalink_base: "https://store.example.com".to_owned(),
        }
    }
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self { rate_bps: 1_000 }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            handlers: vec![PaymentHandler {
                id: PaymentHandlerId("mock_payment_handler".to_owned()),
                name: "dev.ucp.mock_payment".to_owned(),
                version: crate::capability::UCP_VERSION.to_owned(),
            }],
            authorization_timeout_ms: 5_000,
        }
    }
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            options: vec![
                FulfillmentOption {
                    id: FulfillmentOptionId("standard".to_owned()),
                    title: "Standard Shipping".to_owned(),
                    price: 500,
                    eta_description: "3-5 business days".to_owned(),
                },
                FulfillmentOption {
                    id: FulfillmentOptionId("express".to_owned()),
                    title: "Express Shipping".to_owned(),
                    price: 1_500,
                    eta_description: "1-2 business days".to_owned(),
                },
            ],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), format: LogFormat::Compact }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store: StoreIdentity::default(),
            tax: TaxConfig::default(),
            payment: PaymentConfig::default(),
            fulfillment: FulfillmentConfig::default(),
            discounts: vec![
                DiscountDefinition {
                    code: "WELCOME10".to_owned(),
                    kind: DiscountKind::Percentage(10),
                    active: true,
                },
                DiscountDefinition {
                    code: "SAVE5".to_owned(),
                    kind: DiscountKind::Fixed(500),
                    active: true,
                },
            ],
            logging: LoggingConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load from the given path, the `CARTWRIGHT_CONFIG` path, or defaults
    /// when neither is set. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = path
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let mut config = match resolved {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
                toml::from_str(&raw).map_err(|source| ConfigError::ParseFile { path, source })?
            }
            None => Self::default(),
        };

        if let Ok(level) = env::var("CARTWRIGHT_LOG") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.currency.len() != 3 {
            return Err(ConfigError::Validation(format!(
                "currency must be a 3-letter code, got `{}`",
                self.store.currency
            )));
        }
        if self.tax.rate_bps > 10_000 {
            return Err(ConfigError::Validation(format!(
                "tax rate {} bps exceeds 100%",
                self.tax.rate_bps
            )));
        }
        if self.payment.handlers.is_empty() {
            return Err(ConfigError::Validation(
                "at least one payment handler must be configured".to_owned(),
            ));
        }
        for option in &self.fulfillment.options {
            if option.price < 0 {
                return Err(ConfigError::Validation(format!(
                    "fulfillment option `{}` has a negative price",
                    option.id
                )));
            }
        }
        for discount in &self.discounts {
            match discount.kind {
                DiscountKind::Percentage(pct) if pct > 100 => {
                    return Err(ConfigError::Validation(format!(
                        "discount `{}` exceeds 100%",
                        discount.code
                    )));
                }
                DiscountKind::Fixed(value) if value < 0 => {
                    return Err(ConfigError::Validation(format!(
                        "discount `{}` has a negative amount",
                        discount.code
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// The merchant's declared capability profile: everything the registry
    /// knows, with checkout marked required, plus the configured payment
    /// handlers.
    pub fn merchant_profile(&self, registry: &CapabilityRegistry) -> MerchantProfile {
        let capabilities = registry
            .all()
            .map(|capability| MerchantCapability {
                name: capability.name.clone(),
                version: capability.version.clone(),
                required: capability.name == "dev.ucp.shopping.checkout",
                extends: capability.extends.clone(),
            })
            .collect();
        MerchantProfile { capabilities, payment_handlers: self.payment.handlers.clone() }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::capability::CapabilityRegistry;
    use crate::config::{ConfigError, StoreConfig};
    use crate::domain::discount::DiscountKind;

    #[test]
    fn default_config_is_valid() {
        let config = StoreConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.store.currency, "USD");
        assert_eq!(config.tax.rate_bps, 1_000);
    }

    #[test]
    fn config_parses_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
            [store]
            name = "Test Flowers"
            currency = "EUR"
            permalink_base = "https://flowers.test"

            [tax]
            rate_bps = 2000

            [[discounts]]
            code = "BLOOM20"
            type = "percentage"
            value = 20
            "#
        )
        .expect("write config");

        let config = StoreConfig::load(Some(file.path())).expect("load config");
        assert_eq!(config.store.currency, "EUR");
        assert_eq!(config.tax.rate_bps, 2_000);
        assert_eq!(config.discounts.len(), 1);
        assert_eq!(config.discounts[0].kind, DiscountKind::Percentage(20));
        // Untouched sections fall back to defaults.
        assert!(!config.payment.handlers.is_empty());
    }

    #[test]
    fn over_unity_tax_rate_is_rejected() {
        let mut config = StoreConfig::default();
        config.tax.rate_bps = 10_001;

        let error = config.validate().expect_err("invalid rate");
        assert!(matches!(error, ConfigError::Validation(_)));
    }

    #[test]
    fn merchant_profile_requires_checkout_and_carries_handlers() {
        let config = StoreConfig::default();
        let profile = config.merchant_profile(&CapabilityRegistry::ucp_shopping());

        let checkout = profile
            .capabilities
            .iter()
            .find(|cap| cap.name == "dev.ucp.shopping.checkout")
            .expect("checkout declared");
        assert!(checkout.required);
        assert!(profile.capabilities.iter().filter(|cap| cap.required).count() == 1);
        assert_eq!(profile.payment_handlers, config.payment.handlers);
    }
}
