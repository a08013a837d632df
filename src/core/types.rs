//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulation day counter
pub type Day = u32;

/// Conversion from soil units (kg/ha) to plant units (g/m²)
pub const KGHA_TO_GSM: f64 = 0.1;

/// Resource being arbitrated between organs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NutrientKind {
    /// Dry matter (carbohydrate)
    Dm,
    /// Nitrogen
    N,
}

impl fmt::Display for NutrientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NutrientKind::Dm => write!(f, "DM"),
            NutrientKind::N => write!(f, "N"),
        }
    }
}

/// Demand tranche, in order of priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tranche {
    Structural,
    Metabolic,
    NonStructural,
}

impl fmt::Display for Tranche {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tranche::Structural => write!(f, "structural"),
            Tranche::Metabolic => write!(f, "metabolic"),
            Tranche::NonStructural => write!(f, "non-structural"),
        }
    }
}

/// Divide, returning zero when the denominator is zero
pub fn divide_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
