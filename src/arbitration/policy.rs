//! Allocation policies - how a pool of supply is shared between organ demands
//!
//! Every policy adds to the structural, metabolic and non-structural
//! allocation arrays of the record, returns the amount it handed out and
//! leaves the remainder in `not_allocated`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::record::BiomassArbitration;
use crate::core::error::{ArbitrationError, Result};
use crate::core::types::divide_or_zero;

/// Interchangeable ways of sharing supply between organs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AllocationPolicy {
    /// Structural/metabolic in proportion to demand, then non-structural
    RelativeAllocation,
    /// Organs filled in list order, earliest first
    PriorityAllocation,
    /// Priority for structural/metabolic, relative for non-structural
    PriorityThenRelativeAllocation,
    /// All three tranches shared in proportion to demand at once
    RelativeAllocationSinglePass,
}

impl AllocationPolicy {
    pub const ALL: [AllocationPolicy; 4] = [
        AllocationPolicy::RelativeAllocation,
        AllocationPolicy::PriorityAllocation,
        AllocationPolicy::PriorityThenRelativeAllocation,
        AllocationPolicy::RelativeAllocationSinglePass,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AllocationPolicy::RelativeAllocation => "RelativeAllocation",
            AllocationPolicy::PriorityAllocation => "PriorityAllocation",
            AllocationPolicy::PriorityThenRelativeAllocation => "PriorityThenRelativeAllocation",
            AllocationPolicy::RelativeAllocationSinglePass => "RelativeAllocationSinglePass",
        }
    }

    /// Share `total_supply` between the organs of `bat`
    ///
    /// Returns the amount allocated. Fails if the supply is invalid, if any
    /// allocation went negative, or if more than the supply was handed out.
    pub fn allocate(
        self,
        bat: &mut BiomassArbitration,
        total_supply: f64,
        tolerance: f64,
    ) -> Result<f64> {
        if !total_supply.is_finite() || total_supply < 0.0 {
            return Err(ArbitrationError::InvalidSupply {
                kind: bat.kind,
                supply: total_supply,
            });
        }

        let allocated = match self {
            AllocationPolicy::RelativeAllocation => relative_allocation(bat, total_supply),
            AllocationPolicy::PriorityAllocation => priority_allocation(bat, total_supply),
            AllocationPolicy::PriorityThenRelativeAllocation => {
                priority_then_relative_allocation(bat, total_supply)
            }
            AllocationPolicy::RelativeAllocationSinglePass => {
                relative_allocation_single_pass(bat, total_supply)
            }
        };

        bat.check_non_negative()?;
        if allocated > total_supply + tolerance {
            return Err(ArbitrationError::OverAllocation {
                kind: bat.kind,
                supply: total_supply,
                allocated,
            });
        }
        Ok(allocated)
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        AllocationPolicy::RelativeAllocation
    }
}

impl fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AllocationPolicy {
    type Err = ArbitrationError;

    fn from_str(s: &str) -> Result<Self> {
        AllocationPolicy::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ArbitrationError::UnknownPolicy(s.to_string()))
    }
}

impl TryFrom<String> for AllocationPolicy {
    type Error = ArbitrationError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AllocationPolicy> for String {
    fn from(policy: AllocationPolicy) -> Self {
        policy.name().to_string()
    }
}

/// Two passes: structural and metabolic shared by relative demand, then the
/// first-pass remainder shared by relative non-structural demand
pub fn relative_allocation(bat: &mut BiomassArbitration, total_supply: f64) -> f64 {
    let first = relative_structural_metabolic_pass(bat, total_supply);
    let second = relative_non_structural_pass(bat, total_supply - first);
    finish(bat, total_supply, first + second)
}

/// Two passes, both in organ order: each organ is filled before the next
/// sees any of what remains
pub fn priority_allocation(bat: &mut BiomassArbitration, total_supply: f64) -> f64 {
    let first = priority_structural_metabolic_pass(bat, total_supply);
    let second = priority_non_structural_pass(bat, total_supply - first);
    finish(bat, total_supply, first + second)
}

/// Priority pass for structural and metabolic, relative pass for
/// non-structural
pub fn priority_then_relative_allocation(bat: &mut BiomassArbitration, total_supply: f64) -> f64 {
    let first = priority_structural_metabolic_pass(bat, total_supply);
    let second = relative_non_structural_pass(bat, total_supply - first);
    finish(bat, total_supply, first + second)
}

/// One pass over all three tranches, each receiving its share of total
/// demand, so non-structural demand gets a pro-rata share even when
/// structural demand is not met
pub fn relative_allocation_single_pass(bat: &mut BiomassArbitration, total_supply: f64) -> f64 {
    let structural_fraction = divide_or_zero(bat.total_structural_demand, bat.total_plant_demand);
    let metabolic_fraction = divide_or_zero(bat.total_metabolic_demand, bat.total_plant_demand);
    let non_structural_fraction =
        divide_or_zero(bat.total_non_structural_demand, bat.total_plant_demand);

    let mut allocated = 0.0;
    for i in 0..bat.organ_count() {
        let (structural_req, metabolic_req, non_structural_req) = bat.requirements(i);
        if structural_req + metabolic_req + non_structural_req <= 0.0 {
            continue;
        }
        let structural = structural_req
            .min(total_supply * structural_fraction * bat.relative_structural_demand[i]);
        let metabolic =
            metabolic_req.min(total_supply * metabolic_fraction * bat.relative_metabolic_demand[i]);
        let non_structural = non_structural_req
            .min(total_supply * non_structural_fraction * bat.relative_non_structural_demand[i]);

        bat.structural_allocation[i] += structural;
        bat.metabolic_allocation[i] += metabolic;
        bat.non_structural_allocation[i] += non_structural;
        allocated += structural + metabolic + non_structural;
    }
    finish(bat, total_supply, allocated)
}

fn relative_structural_metabolic_pass(bat: &mut BiomassArbitration, supply: f64) -> f64 {
    let structural_fraction = divide_or_zero(
        bat.total_structural_demand,
        bat.total_structural_demand + bat.total_metabolic_demand,
    );

    let mut allocated = 0.0;
    for i in 0..bat.organ_count() {
        let (structural_req, metabolic_req, _) = bat.requirements(i);
        if structural_req + metabolic_req <= 0.0 {
            continue;
        }
        let structural =
            structural_req.min(supply * structural_fraction * bat.relative_structural_demand[i]);
        let metabolic = metabolic_req
            .min(supply * (1.0 - structural_fraction) * bat.relative_metabolic_demand[i]);
        bat.structural_allocation[i] += structural;
        bat.metabolic_allocation[i] += metabolic;
        allocated += structural + metabolic;
    }
    allocated
}

fn priority_structural_metabolic_pass(bat: &mut BiomassArbitration, supply: f64) -> f64 {
    let mut remaining = supply;
    for i in 0..bat.organ_count() {
        if remaining <= 0.0 {
            break;
        }
        let (structural_req, metabolic_req, _) = bat.requirements(i);
        if structural_req + metabolic_req <= 0.0 {
            continue;
        }
        let structural_fraction = divide_or_zero(
            bat.structural_demand[i],
            bat.structural_demand[i] + bat.metabolic_demand[i],
        );
        let mut structural = structural_req.min(remaining * structural_fraction);
        let mut metabolic = metabolic_req.min(remaining * (1.0 - structural_fraction));

        // The demand split can leave one tranche short while pool remains
        let spare = remaining - structural - metabolic;
        if spare > 0.0 {
            let extra_structural = (structural_req - structural).min(spare);
            structural += extra_structural;
            metabolic += (metabolic_req - metabolic).min(spare - extra_structural);
        }

        bat.structural_allocation[i] += structural;
        bat.metabolic_allocation[i] += metabolic;
        remaining -= structural + metabolic;
    }
    supply - remaining
}

fn relative_non_structural_pass(bat: &mut BiomassArbitration, supply: f64) -> f64 {
    if supply <= 0.0 {
        return 0.0;
    }
    let mut allocated = 0.0;
    for i in 0..bat.organ_count() {
        let (_, _, non_structural_req) = bat.requirements(i);
        if non_structural_req <= 0.0 {
            continue;
        }
        let non_structural = non_structural_req.min(supply * bat.relative_non_structural_demand[i]);
        bat.non_structural_allocation[i] += non_structural;
        allocated += non_structural;
    }
    allocated
}

fn priority_non_structural_pass(bat: &mut BiomassArbitration, supply: f64) -> f64 {
    let mut remaining = supply;
    for i in 0..bat.organ_count() {
        if remaining <= 0.0 {
            break;
        }
        let (_, _, non_structural_req) = bat.requirements(i);
        let non_structural = non_structural_req.min(remaining);
        bat.non_structural_allocation[i] += non_structural;
        remaining -= non_structural;
    }
    supply - remaining
}

fn finish(bat: &mut BiomassArbitration, total_supply: f64, allocated: f64) -> f64 {
    bat.not_allocated = total_supply - allocated;
    allocated
}
