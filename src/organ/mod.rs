//! Organ-facing data contracts
//!
//! Organs declare what they can supply and what they demand each day, and
//! receive back what the arbitrator decided. The organ models themselves
//! live outside the arbitrator; `SimpleOrgan` is a reference implementation.

pub mod biomass;
pub mod simple;

pub use biomass::Biomass;
pub use simple::{OrganParams, SimpleOrgan, UptakeParams};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::types::NutrientKind;
use crate::soil::{LayeredNitrogen, SoilZone};

/// Supply channels an organ offers for one nutrient type (g/m²/day)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomassSupply {
    /// Freed by senescence today
    pub reallocation: f64,
    /// Acquired externally (root N uptake)
    pub uptake: f64,
    /// Newly fixed (photosynthesis for DM, symbiotic fixation for N)
    pub fixation: f64,
    /// Mobile reserves moved out of live tissue
    pub retranslocation: f64,
}

impl BiomassSupply {
    pub fn total(&self) -> f64 {
        self.reallocation + self.uptake + self.fixation + self.retranslocation
    }
}

/// Demand tranches an organ declares for one nutrient type (g/m²/day)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomassDemand {
    pub structural: f64,
    pub metabolic: f64,
    pub non_structural: f64,
}

impl BiomassDemand {
    pub fn total(&self) -> f64 {
        self.structural + self.metabolic + self.non_structural
    }
}

/// DM the organ would receive if nutrients were unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PotentialAllocation {
    pub structural: f64,
    pub metabolic: f64,
    pub non_structural: f64,
}

impl PotentialAllocation {
    pub fn total(&self) -> f64 {
        self.structural + self.metabolic + self.non_structural
    }
}

/// Final allocation dispatched to an organ for one nutrient type
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BiomassAllocation {
    pub structural: f64,
    pub metabolic: f64,
    pub non_structural: f64,
    /// Taken from this organ's reallocation supply
    pub reallocation: f64,
    /// Taken from this organ's retranslocation supply
    pub retranslocation: f64,
    /// Taken from this organ's fixation supply
    pub fixation: f64,
    /// Taken from this organ's uptake supply
    pub uptake: f64,
    /// DM respired to pay for fixation
    pub respired: f64,
}

impl BiomassAllocation {
    /// Amount added to the organ's tranches
    pub fn growth(&self) -> f64 {
        self.structural + self.metabolic + self.non_structural
    }
}

/// Daily environmental drivers passed to organs before arbitration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyConditions {
    /// Multiplier on potential photosynthesis (1.0 = reference day)
    pub radiation_factor: f64,
}

impl Default for DailyConditions {
    fn default() -> Self {
        Self {
            radiation_factor: 1.0,
        }
    }
}

/// A plant organ as seen by the arbitrator
pub trait Organ: fmt::Debug + Send {
    fn name(&self) -> &str;

    /// Supply offered today for the given nutrient
    fn supply(&self, kind: NutrientKind) -> BiomassSupply;

    /// Demand declared today for the given nutrient
    ///
    /// N demand may depend on the potential DM allocation pushed earlier in
    /// the day.
    fn demand(&self, kind: NutrientKind) -> BiomassDemand;

    fn live(&self) -> &Biomass;

    fn dead(&self) -> &Biomass;

    /// Live plus dead pool amount of the given nutrient
    fn pool_amount(&self, kind: NutrientKind) -> f64 {
        self.live().amount(kind) + self.dead().amount(kind)
    }

    /// Minimum N concentration of new growth (g N / g DM)
    fn min_n_conc(&self) -> f64;

    /// DM respired per unit of resource fixed
    fn n_fixation_cost(&self) -> f64 {
        0.0
    }

    /// Called once per day before any arbitration
    fn start_day(&mut self, _conditions: &DailyConditions) {}

    fn set_potential_allocation(&mut self, potential: PotentialAllocation);

    fn set_allocation(&mut self, kind: NutrientKind, allocation: BiomassAllocation);

    /// Potential NO3/NH4 uptake from each layer of a zone (kg/ha)
    ///
    /// Organs that do not take up nitrogen return None.
    fn nitrogen_uptake_supply(&self, _zone: &SoilZone) -> Option<LayeredNitrogen> {
        None
    }

    /// Potential water uptake from each layer of a zone (mm)
    fn water_uptake_supply(&self, _zone: &SoilZone) -> Option<Vec<f64>> {
        None
    }

    /// Water the organ needs today (mm)
    fn water_demand(&self) -> f64 {
        0.0
    }

    fn set_water_uptake(&mut self, _uptake: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let supply = BiomassSupply {
            reallocation: 1.0,
            uptake: 2.0,
            fixation: 3.0,
            retranslocation: 4.0,
        };
        assert_eq!(supply.total(), 10.0);

        let demand = BiomassDemand {
            structural: 1.0,
            metabolic: 0.5,
            non_structural: 0.25,
        };
        assert_eq!(demand.total(), 1.75);
    }
}
