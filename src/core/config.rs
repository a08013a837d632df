//! Arbitrator configuration with documented constants
//!
//! All tolerances used by the arbitration passes are collected here with
//! explanations of what they guard.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::arbitration::policy::AllocationPolicy;
use crate::core::error::{ArbitrationError, Result};
use crate::core::types::KGHA_TO_GSM;

/// Configuration for one plant's organ arbitrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitratorConfig {
    // === POLICIES ===
    /// Policy used to distribute dry matter between organs
    pub dm_policy: AllocationPolicy,

    /// Policy used to distribute nitrogen between organs
    pub n_policy: AllocationPolicy,

    // === TOLERANCES ===
    /// Smallest channel supply worth arbitrating (g/m²)
    ///
    /// Supplies at or below this are treated as absent. Also the tolerance
    /// allowed when checking that a policy pass did not hand out more than
    /// the supply it was given.
    pub supply_threshold: f64,

    /// Respiration cost that may remain unmet after every clawback stage
    ///
    /// Anything above this means the fixing organ respires more than the
    /// plant can pay for and the run is stopped.
    pub clawback_tolerance: f64,

    /// Largest end-of-day mass gain not explained by new supply
    pub mass_balance_tolerance: f64,

    // === UNITS ===
    /// Factor converting soil uptake (kg/ha) into plant units (g/m²)
    pub kgha_to_gsm: f64,
}

impl Default for ArbitratorConfig {
    fn default() -> Self {
        Self {
            dm_policy: AllocationPolicy::RelativeAllocation,
            n_policy: AllocationPolicy::RelativeAllocation,

            supply_threshold: 1e-11,
            clawback_tolerance: 1e-10,
            mass_balance_tolerance: 1e-9,

            kgha_to_gsm: KGHA_TO_GSM,
        }
    }
}

impl ArbitratorConfig {
    pub fn with_policies(
        mut self,
        dm_policy: AllocationPolicy,
        n_policy: AllocationPolicy,
    ) -> Self {
        self.dm_policy = dm_policy;
        self.n_policy = n_policy;
        self
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let tolerances = [
            ("supply_threshold", self.supply_threshold),
            ("clawback_tolerance", self.clawback_tolerance),
            ("mass_balance_tolerance", self.mass_balance_tolerance),
            ("kgha_to_gsm", self.kgha_to_gsm),
        ];
        for (name, value) in tolerances {
            if !value.is_finite() || value <= 0.0 {
                return Err(ArbitrationError::InvalidConfig(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Load a config from a TOML file
    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse a config from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: ArbitratorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}
