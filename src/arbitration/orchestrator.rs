//! Organ arbitrator - runs the daily arbitration cycle for one plant
//!
//! The day is split into entry points so an external soil arbitrator can
//! settle competition between plants in the middle:
//!
//! 1. `do_potential_partitioning`: DM setup, reallocation, fixation (with
//!    its respiration) and retranslocation; potential DM pushed to organs;
//!    N setup and N reallocation
//! 2. `nitrogen_uptake_estimates`: per-zone N requests for the soil
//! 3. `set_nitrogen_allocation`: soil grant turned into N uptake
//! 4. `do_actual_partitioning`: N fixation and retranslocation, nutrient
//!    constraint, dispatch to organs, mass balance
//!
//! Water follows the same estimate/grant round trip between steps 1 and 4.

use serde::Serialize;
use std::fmt;

use super::constraint::constrain_dm_by_nutrient;
use super::fixation::charge_fixation_respiration;
use super::record::BiomassArbitration;
use super::setup::{SetupStrategy, StandardSetup};
use super::supply::{do_fixation, do_reallocation, do_retranslocation, do_uptake};
use super::uptake::{self, WaterArbitration};
use crate::core::config::ArbitratorConfig;
use crate::core::error::{ArbitrationError, Result};
use crate::core::types::NutrientKind;
use crate::organ::Organ;
use crate::soil::{SoilZone, ZoneUptake};

/// Where the arbitrator is in the daily cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArbitrationPhase {
    /// No records; waiting for the day to start
    Idle,
    PotentialPartitioned,
    UptakeEstimated,
    UptakeAllocated,
    /// Allocations dispatched; the next call starts a new day
    Complete,
}

impl fmt::Display for ArbitrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArbitrationPhase::Idle => "Idle",
            ArbitrationPhase::PotentialPartitioned => "PotentialPartitioned",
            ArbitrationPhase::UptakeEstimated => "UptakeEstimated",
            ArbitrationPhase::UptakeAllocated => "UptakeAllocated",
            ArbitrationPhase::Complete => "Complete",
        };
        write!(f, "{}", name)
    }
}

/// Day totals for one nutrient type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NutrientSummary {
    pub total_supply: f64,
    pub total_demand: f64,
    pub allocated: f64,
    pub sink_limitation: f64,
    pub nutrient_limitation: f64,
    pub respiration: f64,
    pub start: f64,
    pub end: f64,
    pub balance_error: f64,
}

impl NutrientSummary {
    fn from_record(bat: &BiomassArbitration) -> Self {
        Self {
            total_supply: bat.total_plant_supply,
            total_demand: bat.total_plant_demand,
            allocated: bat.allocated,
            sink_limitation: bat.sink_limitation,
            nutrient_limitation: bat.nutrient_limitation,
            respiration: bat.total_respiration,
            start: bat.start,
            end: bat.end,
            balance_error: bat.balance_error,
        }
    }
}

/// Outcome of one completed arbitration day
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArbitrationSummary {
    pub dm: NutrientSummary,
    pub n: NutrientSummary,
    pub water: WaterArbitration,
}

/// Daily DM and N arbitrator for one plant
#[derive(Debug)]
pub struct OrganArbitrator {
    config: ArbitratorConfig,
    strategy: Box<dyn SetupStrategy>,
    dm: Option<BiomassArbitration>,
    n: Option<BiomassArbitration>,
    water: WaterArbitration,
    phase: ArbitrationPhase,
}

impl OrganArbitrator {
    pub fn new(config: ArbitratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            strategy: Box::new(StandardSetup),
            dm: None,
            n: None,
            water: WaterArbitration::default(),
            phase: ArbitrationPhase::Idle,
        })
    }

    /// Replace the standard record setup
    pub fn with_strategy(mut self, strategy: Box<dyn SetupStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &ArbitratorConfig {
        &self.config
    }

    pub fn phase(&self) -> ArbitrationPhase {
        self.phase
    }

    pub fn dm(&self) -> Option<&BiomassArbitration> {
        self.dm.as_ref()
    }

    pub fn n(&self) -> Option<&BiomassArbitration> {
        self.n.as_ref()
    }

    pub fn water(&self) -> &WaterArbitration {
        &self.water
    }

    /// Discard both records and return to `Idle`
    pub fn clear(&mut self) {
        self.dm = None;
        self.n = None;
        self.water = WaterArbitration::default();
        self.phase = ArbitrationPhase::Idle;
    }

    /// Start the day: partition DM assuming unlimited nutrients, push the
    /// potential allocation to organs and set up N
    pub fn do_potential_partitioning(&mut self, organs: &mut [Box<dyn Organ>]) -> Result<()> {
        self.expect_phase(
            "do_potential_partitioning",
            &[ArbitrationPhase::Idle, ArbitrationPhase::Complete],
        )?;
        let threshold = self.config.supply_threshold;
        let dm_policy = self.config.dm_policy;

        let mut dm = self.strategy.dm_setup(organs)?;
        do_reallocation(&mut dm, dm_policy, threshold)?;
        let costs: Vec<f64> = organs.iter().map(|o| o.n_fixation_cost()).collect();
        let respiration = do_fixation(&mut dm, dm_policy, &costs, threshold)?;
        charge_fixation_respiration(
            &mut dm,
            &respiration,
            NutrientKind::Dm,
            self.config.clawback_tolerance,
        )?;
        do_retranslocation(&mut dm, dm_policy, threshold)?;
        dm.refresh_allocation_totals();

        for (i, organ) in organs.iter_mut().enumerate() {
            organ.set_potential_allocation(dm.potential_allocation(i));
        }

        let mut n = self.strategy.nutrient_setup(organs, NutrientKind::N)?;
        do_reallocation(&mut n, self.config.n_policy, threshold)?;

        tracing::debug!(
            "Potential DM {:.4} of supply {:.4} (sink limitation {:.4}); N demand {:.5}",
            dm.allocated,
            dm.total_plant_supply,
            dm.sink_limitation,
            n.total_plant_demand
        );

        self.dm = Some(dm);
        self.n = Some(n);
        self.water = WaterArbitration::default();
        self.phase = ArbitrationPhase::PotentialPartitioned;
        Ok(())
    }

    /// Per-zone N uptake this plant asks the soil for, never more than the
    /// demand reallocation left unmet
    pub fn nitrogen_uptake_estimates(
        &mut self,
        organs: &[Box<dyn Organ>],
        zones: &[SoilZone],
        plant_area: f64,
    ) -> Result<Vec<ZoneUptake>> {
        self.expect_phase("nitrogen_uptake_estimates", &[ArbitrationPhase::PotentialPartitioned])?;
        let n = self.n.as_mut().ok_or(ArbitrationError::NotSetUp(NutrientKind::N))?;
        check_organ_count(n, organs.len())?;

        let kgha_to_gsm = self.config.kgha_to_gsm;
        let requests = uptake::nitrogen_uptake_estimates(organs, n, zones, plant_area, kgha_to_gsm);
        tracing::debug!(
            "N uptake potential {:.5} g/m2 against unmet demand {:.5}",
            n.total_uptake_supply,
            (n.total_plant_demand - n.total_reallocation).max(0.0)
        );
        self.phase = ArbitrationPhase::UptakeEstimated;
        Ok(requests)
    }

    /// Take the soil arbitrator's N grant and share it between organ demands
    pub fn set_nitrogen_allocation(
        &mut self,
        granted: &[ZoneUptake],
        plant_area: f64,
    ) -> Result<()> {
        self.expect_phase("set_nitrogen_allocation", &[ArbitrationPhase::UptakeEstimated])?;
        let n = self.n.as_mut().ok_or(ArbitrationError::NotSetUp(NutrientKind::N))?;

        uptake::apply_nitrogen_grant(n, granted, plant_area, self.config.kgha_to_gsm);
        let taken_up = do_uptake(n, self.config.n_policy, self.config.supply_threshold)?;
        tracing::debug!(
            "N uptake {:.5} allocated of {:.5} granted",
            taken_up,
            n.total_uptake_supply
        );

        self.phase = ArbitrationPhase::UptakeAllocated;
        Ok(())
    }

    /// Per-zone water this plant asks the soil for, never more than its
    /// demand
    pub fn water_uptake_estimates(
        &mut self,
        organs: &[Box<dyn Organ>],
        zones: &[SoilZone],
        plant_area: f64,
    ) -> Result<Vec<ZoneUptake>> {
        self.expect_phase("water_uptake_estimates", &Self::UPTAKE_WINDOW)?;
        let (water, requests) = uptake::water_uptake_estimates(organs, zones, plant_area);
        self.water = water;
        Ok(requests)
    }

    /// Share granted water between organs
    pub fn set_water_allocation(
        &mut self,
        organs: &mut [Box<dyn Organ>],
        granted: &[ZoneUptake],
        plant_area: f64,
    ) -> Result<()> {
        self.expect_phase("set_water_allocation", &Self::UPTAKE_WINDOW)?;
        if self.water.organ_supply.len() != organs.len() {
            return Err(ArbitrationError::PhaseOrder {
                operation: "set_water_allocation",
                phase: "water not estimated".to_string(),
            });
        }
        uptake::apply_water_grant(organs, &mut self.water, granted, plant_area);
        tracing::debug!(
            "Water uptake {:.3} mm of {:.3} demanded",
            self.water.uptake,
            self.water.demand
        );
        Ok(())
    }

    /// Finish the day: fix and retranslocate N, constrain DM by N, dispatch
    /// allocations and verify mass balance
    pub fn do_actual_partitioning(
        &mut self,
        organs: &mut [Box<dyn Organ>],
    ) -> Result<ArbitrationSummary> {
        self.expect_phase("do_actual_partitioning", &[ArbitrationPhase::UptakeAllocated])?;
        let config = &self.config;
        let dm = self.dm.as_mut().ok_or(ArbitrationError::NotSetUp(NutrientKind::Dm))?;
        let n = self.n.as_mut().ok_or(ArbitrationError::NotSetUp(NutrientKind::N))?;
        check_organ_count(dm, organs.len())?;
        check_organ_count(n, organs.len())?;

        let costs: Vec<f64> = organs.iter().map(|o| o.n_fixation_cost()).collect();
        let respiration = do_fixation(n, config.n_policy, &costs, config.supply_threshold)?;
        charge_fixation_respiration(dm, &respiration, NutrientKind::N, config.clawback_tolerance)?;
        do_retranslocation(n, config.n_policy, config.supply_threshold)?;

        let min_n_conc: Vec<f64> = organs.iter().map(|o| o.min_n_conc()).collect();
        let limitation = constrain_dm_by_nutrient(dm, n, &min_n_conc);
        if limitation > 0.0 {
            tracing::debug!("N limited DM allocation by {:.4}", limitation);
        }

        dm.check_non_negative()?;
        n.check_non_negative()?;
        for (i, organ) in organs.iter_mut().enumerate() {
            organ.set_allocation(NutrientKind::Dm, dm.organ_allocation(i));
        }
        for (i, organ) in organs.iter_mut().enumerate() {
            organ.set_allocation(NutrientKind::N, n.organ_allocation(i));
        }

        verify_mass_balance(dm, organs, config.mass_balance_tolerance)?;
        verify_mass_balance(n, organs, config.mass_balance_tolerance)?;

        let summary = ArbitrationSummary {
            dm: NutrientSummary::from_record(dm),
            n: NutrientSummary::from_record(n),
            water: self.water.clone(),
        };
        self.phase = ArbitrationPhase::Complete;
        Ok(summary)
    }

    const UPTAKE_WINDOW: [ArbitrationPhase; 3] = [
        ArbitrationPhase::PotentialPartitioned,
        ArbitrationPhase::UptakeEstimated,
        ArbitrationPhase::UptakeAllocated,
    ];

    fn expect_phase(&self, operation: &'static str, allowed: &[ArbitrationPhase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ArbitrationError::PhaseOrder {
                operation,
                phase: self.phase.to_string(),
            })
        }
    }
}

fn check_organ_count(bat: &BiomassArbitration, organs: usize) -> Result<()> {
    if bat.organ_count() == organs {
        Ok(())
    } else {
        Err(ArbitrationError::InvalidConfig(format!(
            "{} record covers {} organs but {} were passed",
            bat.kind,
            bat.organ_count(),
            organs
        )))
    }
}

/// Check the organs gained no more than was supplied and no more than was
/// demanded
fn verify_mass_balance(
    bat: &mut BiomassArbitration,
    organs: &[Box<dyn Organ>],
    tolerance: f64,
) -> Result<()> {
    bat.end = organs.iter().map(|o| o.pool_amount(bat.kind)).sum();
    let gain = bat.end - bat.start;
    bat.balance_error = gain - bat.total_uptake_supply - bat.total_fixation_supply;
    tracing::trace!(
        "{} mass balance: start {:.6} end {:.6} error {:.3e}",
        bat.kind,
        bat.start,
        bat.end,
        bat.balance_error
    );

    if bat.balance_error > tolerance {
        return Err(ArbitrationError::MassBalance {
            kind: bat.kind,
            check: "gain exceeds new supply",
            error: bat.balance_error,
            tolerance,
        });
    }
    let over_demand = gain - bat.total_plant_demand;
    if over_demand > tolerance {
        return Err(ArbitrationError::MassBalance {
            kind: bat.kind,
            check: "gain exceeds demand",
            error: over_demand,
            tolerance,
        });
    }
    Ok(())
}
