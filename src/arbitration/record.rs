//! Arbitration record - per-organ demand, supply and allocation for one
//! nutrient type over one day
//!
//! Arrays are indexed by organ in the order the organs were given to setup.
//! A record is built fresh each day and discarded at the end of it.

use serde::Serialize;

use crate::core::error::{ArbitrationError, Result};
use crate::core::types::{divide_or_zero, NutrientKind, Tranche};
use crate::organ::{BiomassAllocation, BiomassDemand, BiomassSupply, PotentialAllocation};

/// Relative tolerance used when checking that totals match their arrays
const TOTAL_CHECK_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiomassArbitration {
    pub kind: NutrientKind,

    // Demands
    pub structural_demand: Vec<f64>,
    pub metabolic_demand: Vec<f64>,
    pub non_structural_demand: Vec<f64>,
    pub total_demand: Vec<f64>,
    pub relative_structural_demand: Vec<f64>,
    pub relative_metabolic_demand: Vec<f64>,
    pub relative_non_structural_demand: Vec<f64>,
    pub relative_total_demand: Vec<f64>,
    pub total_structural_demand: f64,
    pub total_metabolic_demand: f64,
    pub total_non_structural_demand: f64,
    pub total_plant_demand: f64,

    // Supplies
    pub reallocation_supply: Vec<f64>,
    pub uptake_supply: Vec<f64>,
    pub fixation_supply: Vec<f64>,
    pub retranslocation_supply: Vec<f64>,
    pub total_reallocation_supply: f64,
    pub total_uptake_supply: f64,
    pub total_fixation_supply: f64,
    pub total_retranslocation_supply: f64,
    pub total_plant_supply: f64,

    // Amounts taken from each supply channel
    pub reallocation: Vec<f64>,
    pub uptake: Vec<f64>,
    pub fixation: Vec<f64>,
    pub retranslocation: Vec<f64>,
    pub total_reallocation: f64,
    pub total_uptake: f64,
    pub total_fixation: f64,
    pub total_retranslocation: f64,

    // DM respired to pay for fixation
    pub respiration: Vec<f64>,
    pub total_respiration: f64,

    // Allocations
    pub structural_allocation: Vec<f64>,
    pub metabolic_allocation: Vec<f64>,
    pub non_structural_allocation: Vec<f64>,
    pub total_allocation: Vec<f64>,
    pub total_structural_allocation: f64,
    pub total_metabolic_allocation: f64,
    pub total_non_structural_allocation: f64,

    /// DM each organ can build with the N it received (N records only)
    pub constrained_growth: Vec<f64>,

    pub allocated: f64,
    /// Residual of the most recent policy pass, overwritten by every pass
    pub not_allocated: f64,
    pub sink_limitation: f64,
    pub nutrient_limitation: f64,

    // Mass balance
    pub start: f64,
    pub end: f64,
    pub balance_error: f64,
}

impl BiomassArbitration {
    /// Create an empty record sized for `organs` organs
    pub fn new(kind: NutrientKind, organs: usize) -> Self {
        let zeros = || vec![0.0; organs];
        Self {
            kind,
            structural_demand: zeros(),
            metabolic_demand: zeros(),
            non_structural_demand: zeros(),
            total_demand: zeros(),
            relative_structural_demand: zeros(),
            relative_metabolic_demand: zeros(),
            relative_non_structural_demand: zeros(),
            relative_total_demand: zeros(),
            total_structural_demand: 0.0,
            total_metabolic_demand: 0.0,
            total_non_structural_demand: 0.0,
            total_plant_demand: 0.0,
            reallocation_supply: zeros(),
            uptake_supply: zeros(),
            fixation_supply: zeros(),
            retranslocation_supply: zeros(),
            total_reallocation_supply: 0.0,
            total_uptake_supply: 0.0,
            total_fixation_supply: 0.0,
            total_retranslocation_supply: 0.0,
            total_plant_supply: 0.0,
            reallocation: zeros(),
            uptake: zeros(),
            fixation: zeros(),
            retranslocation: zeros(),
            total_reallocation: 0.0,
            total_uptake: 0.0,
            total_fixation: 0.0,
            total_retranslocation: 0.0,
            respiration: zeros(),
            total_respiration: 0.0,
            structural_allocation: zeros(),
            metabolic_allocation: zeros(),
            non_structural_allocation: zeros(),
            total_allocation: zeros(),
            total_structural_allocation: 0.0,
            total_metabolic_allocation: 0.0,
            total_non_structural_allocation: 0.0,
            constrained_growth: zeros(),
            allocated: 0.0,
            not_allocated: 0.0,
            sink_limitation: 0.0,
            nutrient_limitation: 0.0,
            start: 0.0,
            end: 0.0,
            balance_error: 0.0,
        }
    }

    /// Build a record from per-organ supplies and demands, with totals and
    /// relative demands computed
    pub fn from_parts(
        kind: NutrientKind,
        supplies: &[BiomassSupply],
        demands: &[BiomassDemand],
    ) -> Self {
        let mut bat = Self::new(kind, demands.len().max(supplies.len()));
        for (i, supply) in supplies.iter().enumerate() {
            bat.set_supply(i, supply);
        }
        for (i, demand) in demands.iter().enumerate() {
            bat.set_demand(i, demand);
        }
        bat.refresh_supply_totals();
        bat.refresh_demand_totals();
        bat
    }

    pub fn organ_count(&self) -> usize {
        self.total_demand.len()
    }

    pub fn set_supply(&mut self, organ: usize, supply: &BiomassSupply) {
        self.reallocation_supply[organ] = supply.reallocation;
        self.uptake_supply[organ] = supply.uptake;
        self.fixation_supply[organ] = supply.fixation;
        self.retranslocation_supply[organ] = supply.retranslocation;
    }

    pub fn set_demand(&mut self, organ: usize, demand: &BiomassDemand) {
        self.structural_demand[organ] = demand.structural;
        self.metabolic_demand[organ] = demand.metabolic;
        self.non_structural_demand[organ] = demand.non_structural;
        self.total_demand[organ] = demand.total();
    }

    /// Recompute supply totals, including total plant supply
    pub fn refresh_supply_totals(&mut self) {
        self.total_reallocation_supply = self.reallocation_supply.iter().sum();
        self.total_uptake_supply = self.uptake_supply.iter().sum();
        self.total_fixation_supply = self.fixation_supply.iter().sum();
        self.total_retranslocation_supply = self.retranslocation_supply.iter().sum();
        self.total_plant_supply = self.total_reallocation_supply
            + self.total_uptake_supply
            + self.total_fixation_supply
            + self.total_retranslocation_supply;
    }

    /// Recompute demand totals and relative demands
    ///
    /// Relative demands of a tranche with no total demand stay at zero.
    pub fn refresh_demand_totals(&mut self) {
        self.total_structural_demand = self.structural_demand.iter().sum();
        self.total_metabolic_demand = self.metabolic_demand.iter().sum();
        self.total_non_structural_demand = self.non_structural_demand.iter().sum();
        self.total_plant_demand = self.total_structural_demand
            + self.total_metabolic_demand
            + self.total_non_structural_demand;

        for i in 0..self.organ_count() {
            self.relative_structural_demand[i] =
                divide_or_zero(self.structural_demand[i], self.total_structural_demand);
            self.relative_metabolic_demand[i] =
                divide_or_zero(self.metabolic_demand[i], self.total_metabolic_demand);
            self.relative_non_structural_demand[i] =
                divide_or_zero(self.non_structural_demand[i], self.total_non_structural_demand);
            self.relative_total_demand[i] =
                divide_or_zero(self.total_demand[i], self.total_plant_demand);
        }
    }

    /// Recompute channel and allocation totals, and the grand total allocated
    pub fn refresh_allocation_totals(&mut self) {
        self.total_reallocation = self.reallocation.iter().sum();
        self.total_uptake = self.uptake.iter().sum();
        self.total_fixation = self.fixation.iter().sum();
        self.total_retranslocation = self.retranslocation.iter().sum();
        self.total_respiration = self.respiration.iter().sum();

        for i in 0..self.organ_count() {
            self.total_allocation[i] = self.structural_allocation[i]
                + self.metabolic_allocation[i]
                + self.non_structural_allocation[i];
        }
        self.total_structural_allocation = self.structural_allocation.iter().sum();
        self.total_metabolic_allocation = self.metabolic_allocation.iter().sum();
        self.total_non_structural_allocation = self.non_structural_allocation.iter().sum();
        self.allocated = self.total_structural_allocation
            + self.total_metabolic_allocation
            + self.total_non_structural_allocation;
    }

    /// Check per-organ total demand against its tranches and every total
    /// against the array it summarises
    pub fn check_demand_consistency(&self) -> Result<()> {
        for i in 0..self.organ_count() {
            let tranches = self.structural_demand[i]
                + self.metabolic_demand[i]
                + self.non_structural_demand[i];
            if !close(self.total_demand[i], tranches) {
                return Err(ArbitrationError::DemandMismatch {
                    kind: self.kind,
                    organ: i,
                });
            }
        }

        let sums = [
            (self.total_structural_demand, &self.structural_demand),
            (self.total_metabolic_demand, &self.metabolic_demand),
            (self.total_non_structural_demand, &self.non_structural_demand),
            (self.total_plant_demand, &self.total_demand),
        ];
        for (total, values) in sums {
            if !close(total, values.iter().sum::<f64>()) {
                return Err(ArbitrationError::InvalidConfig(format!(
                    "{} demand totals do not match per-organ demands",
                    self.kind
                )));
            }
        }
        Ok(())
    }

    /// Fail on the first negative allocation
    pub fn check_non_negative(&self) -> Result<()> {
        let tranches = [
            (Tranche::Structural, &self.structural_allocation),
            (Tranche::Metabolic, &self.metabolic_allocation),
            (Tranche::NonStructural, &self.non_structural_allocation),
        ];
        for (tranche, values) in tranches {
            if let Some((organ, &value)) = values.iter().enumerate().find(|(_, v)| **v < 0.0) {
                return Err(ArbitrationError::NegativeAllocation {
                    kind: self.kind,
                    organ,
                    tranche,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Unmet structural, metabolic and non-structural requirement of an organ
    pub fn requirements(&self, organ: usize) -> (f64, f64, f64) {
        (
            (self.structural_demand[organ] - self.structural_allocation[organ]).max(0.0),
            (self.metabolic_demand[organ] - self.metabolic_allocation[organ]).max(0.0),
            (self.non_structural_demand[organ] - self.non_structural_allocation[organ]).max(0.0),
        )
    }

    pub fn potential_allocation(&self, organ: usize) -> PotentialAllocation {
        PotentialAllocation {
            structural: self.structural_allocation[organ],
            metabolic: self.metabolic_allocation[organ],
            non_structural: self.non_structural_allocation[organ],
        }
    }

    pub fn organ_allocation(&self, organ: usize) -> BiomassAllocation {
        BiomassAllocation {
            structural: self.structural_allocation[organ],
            metabolic: self.metabolic_allocation[organ],
            non_structural: self.non_structural_allocation[organ],
            reallocation: self.reallocation[organ],
            retranslocation: self.retranslocation[organ],
            fixation: self.fixation[organ],
            uptake: self.uptake[organ],
            respired: self.respiration[organ],
        }
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOTAL_CHECK_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demand(structural: f64, metabolic: f64, non_structural: f64) -> BiomassDemand {
        BiomassDemand {
            structural,
            metabolic,
            non_structural,
        }
    }

    #[test]
    fn test_from_parts_totals() {
        let supplies = [
            BiomassSupply {
                fixation: 10.0,
                ..Default::default()
            },
            BiomassSupply {
                retranslocation: 2.0,
                reallocation: 1.0,
                ..Default::default()
            },
        ];
        let demands = [demand(3.0, 1.0, 0.0), demand(1.0, 1.0, 4.0)];
        let bat = BiomassArbitration::from_parts(NutrientKind::Dm, &supplies, &demands);

        assert_eq!(bat.organ_count(), 2);
        assert_eq!(bat.total_fixation_supply, 10.0);
        assert_eq!(bat.total_plant_supply, 13.0);
        assert_eq!(bat.total_structural_demand, 4.0);
        assert_eq!(bat.total_plant_demand, 10.0);
        assert_eq!(bat.relative_structural_demand, vec![0.75, 0.25]);
        assert_eq!(bat.relative_non_structural_demand, vec![0.0, 1.0]);
        assert!(bat.check_demand_consistency().is_ok());
    }

    #[test]
    fn test_zero_tranche_demand_gives_zero_relative_demand() {
        let demands = [demand(0.0, 0.0, 0.0), demand(0.0, 0.0, 0.0)];
        let bat = BiomassArbitration::from_parts(NutrientKind::N, &[], &demands);
        assert!(bat.relative_structural_demand.iter().all(|v| *v == 0.0));
        assert!(bat.relative_total_demand.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_demand_mismatch_detected() {
        let mut bat =
            BiomassArbitration::from_parts(NutrientKind::Dm, &[], &[demand(1.0, 1.0, 1.0)]);
        bat.total_demand[0] = 4.0;
        assert!(matches!(
            bat.check_demand_consistency(),
            Err(ArbitrationError::DemandMismatch { organ: 0, .. })
        ));
    }

    #[test]
    fn test_negative_allocation_detected() {
        let mut bat = BiomassArbitration::new(NutrientKind::Dm, 2);
        bat.metabolic_allocation[1] = -0.5;
        assert!(matches!(
            bat.check_non_negative(),
            Err(ArbitrationError::NegativeAllocation {
                organ: 1,
                tranche: Tranche::Metabolic,
                ..
            })
        ));
    }

    #[test]
    fn test_refresh_allocation_totals() {
        let mut bat = BiomassArbitration::new(NutrientKind::Dm, 2);
        bat.structural_allocation = vec![1.0, 2.0];
        bat.non_structural_allocation = vec![0.5, 0.0];
        bat.refresh_allocation_totals();
        assert_eq!(bat.total_allocation, vec![1.5, 2.0]);
        assert_eq!(bat.allocated, 3.5);
    }

    #[test]
    fn test_empty_record() {
        let bat = BiomassArbitration::from_parts(NutrientKind::Dm, &[], &[]);
        assert_eq!(bat.organ_count(), 0);
        assert!(bat.check_demand_consistency().is_ok());
        assert!(bat.check_non_negative().is_ok());
    }
}
