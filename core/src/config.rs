//! Runtime configuration, read from a JSON file.
//!
//! ```json
//! {
//!   "database": "billing.db",
//!   "code_seed": 42,
//!   "default_pricing": { "interest_rate": 24.0, "admin_rate": 5.0 }
//! }
//! ```

use crate::pricing::validate_rates;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub interest_rate: f64,
    pub admin_rate:    f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_database")]
    pub database: String,
    /// Seed for the display-code stream; OS entropy when absent.
    #[serde(default)]
    pub code_seed: Option<u64>,
    /// Seeded into an empty pricing table at startup.
    #[serde(default)]
    pub default_pricing: Option<PricingConfig>,
}

fn default_database() -> String {
    "billing.db".into()
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            database:        default_database(),
            code_seed:       None,
            default_pricing: None,
        }
    }
}

impl BillingConfig {
    /// Load from a JSON file.
    /// In tests, use BillingConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Self::from_json(&content).map_err(|e| anyhow::anyhow!("Invalid config {path}: {e}"))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: BillingConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(p) = &self.default_pricing {
            validate_rates(p.interest_rate, p.admin_rate)?;
        }
        Ok(())
    }

    /// In-memory database, fixed seed, 24%/yr interest and 5% admin fee.
    pub fn default_test() -> Self {
        Self {
            database:        ":memory:".into(),
            code_seed:       Some(42),
            default_pricing: Some(PricingConfig {
                interest_rate: 24.0,
                admin_rate:    5.0,
            }),
        }
    }
}
