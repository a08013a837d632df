//! Supply channel steps
//!
//! Each step shares one channel's total supply between organ demands with
//! the configured policy, then charges what was handed out back to the
//! supplying organs in proportion to what each offered.

use super::policy::AllocationPolicy;
use super::record::BiomassArbitration;
use crate::core::error::Result;

/// Share senescence-freed supply between organs
pub fn do_reallocation(
    bat: &mut BiomassArbitration,
    policy: AllocationPolicy,
    threshold: f64,
) -> Result<f64> {
    if bat.total_reallocation_supply <= threshold {
        return Ok(0.0);
    }
    let reallocated = {
        let supply = bat.total_reallocation_supply;
        policy.allocate(bat, supply, threshold)?
    };
    charge_suppliers(
        &bat.reallocation_supply,
        bat.total_reallocation_supply,
        reallocated,
        &mut bat.reallocation,
    );
    bat.refresh_allocation_totals();
    Ok(reallocated)
}

/// Share externally acquired supply (root uptake) between organs
pub fn do_uptake(
    bat: &mut BiomassArbitration,
    policy: AllocationPolicy,
    threshold: f64,
) -> Result<f64> {
    if bat.total_uptake_supply <= threshold {
        return Ok(0.0);
    }
    let taken_up = {
        let supply = bat.total_uptake_supply;
        policy.allocate(bat, supply, threshold)?
    };
    charge_suppliers(&bat.uptake_supply, bat.total_uptake_supply, taken_up, &mut bat.uptake);
    bat.refresh_allocation_totals();
    Ok(taken_up)
}

/// Share mobile reserves between organs
///
/// Reserves already remobilised today (to pay fixation respiration) are not
/// offered again.
pub fn do_retranslocation(
    bat: &mut BiomassArbitration,
    policy: AllocationPolicy,
    threshold: f64,
) -> Result<f64> {
    let unused: Vec<f64> = bat
        .retranslocation_supply
        .iter()
        .zip(&bat.retranslocation)
        .map(|(supply, used)| (supply - used).max(0.0))
        .collect();
    let total_unused: f64 = unused.iter().sum();
    if total_unused <= threshold {
        return Ok(0.0);
    }
    let retranslocated = policy.allocate(bat, total_unused, threshold)?;
    charge_suppliers(&unused, total_unused, retranslocated, &mut bat.retranslocation);
    bat.refresh_allocation_totals();
    Ok(retranslocated)
}

/// Share newly fixed supply between organs
///
/// The unallocated remainder of this pass becomes the record's sink
/// limitation. Returns the DM respiration each fixing organ incurs, at
/// `fixation_costs[i]` per unit fixed; charging it is the caller's job.
pub fn do_fixation(
    bat: &mut BiomassArbitration,
    policy: AllocationPolicy,
    fixation_costs: &[f64],
    threshold: f64,
) -> Result<Vec<f64>> {
    let mut respiration = vec![0.0; bat.organ_count()];
    if bat.total_fixation_supply <= threshold {
        return Ok(respiration);
    }

    let fixed = {
        let supply = bat.total_fixation_supply;
        policy.allocate(bat, supply, threshold)?
    };
    // not_allocated is overwritten by the next pass, so catch it here
    bat.sink_limitation = bat.not_allocated;

    if fixed > 0.0 {
        for i in 0..bat.organ_count() {
            if bat.fixation_supply[i] > threshold {
                let relative_supply = bat.fixation_supply[i] / bat.total_fixation_supply;
                bat.fixation[i] = fixed * relative_supply;
                respiration[i] = bat.fixation[i] * fixation_costs.get(i).copied().unwrap_or(0.0);
            }
        }
    }
    bat.refresh_allocation_totals();
    Ok(respiration)
}

fn charge_suppliers(supply: &[f64], total_supply: f64, allocated: f64, taken: &mut [f64]) {
    for (offered, taken) in supply.iter().zip(taken.iter_mut()) {
        if *offered > 0.0 {
            *taken += allocated * offered / total_supply;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NutrientKind;
    use crate::organ::{BiomassDemand, BiomassSupply};

    const TOL: f64 = 1e-11;

    fn record(supplies: &[BiomassSupply], demands: &[(f64, f64, f64)]) -> BiomassArbitration {
        let demands: Vec<BiomassDemand> = demands
            .iter()
            .map(|&(structural, metabolic, non_structural)| BiomassDemand {
                structural,
                metabolic,
                non_structural,
            })
            .collect();
        BiomassArbitration::from_parts(NutrientKind::N, supplies, &demands)
    }

    #[test]
    fn test_reallocation_charged_to_suppliers_by_share() {
        let supplies = [
            BiomassSupply {
                reallocation: 3.0,
                ..Default::default()
            },
            BiomassSupply {
                reallocation: 1.0,
                ..Default::default()
            },
            BiomassSupply::default(),
        ];
        let mut bat = record(&supplies, &[(0.0, 0.0, 0.0), (0.0, 0.0, 0.0), (2.0, 0.0, 0.0)]);

        let reallocated =
            do_reallocation(&mut bat, AllocationPolicy::RelativeAllocation, TOL).unwrap();

        assert!((reallocated - 2.0).abs() < 1e-12);
        assert!((bat.reallocation[0] - 1.5).abs() < 1e-12);
        assert!((bat.reallocation[1] - 0.5).abs() < 1e-12);
        assert_eq!(bat.reallocation[2], 0.0);
        assert!((bat.total_reallocation - 2.0).abs() < 1e-12);
        assert!((bat.structural_allocation[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_negligible_supply_skipped() {
        let supplies = [BiomassSupply {
            retranslocation: 1e-13,
            ..Default::default()
        }];
        let mut bat = record(&supplies, &[(1.0, 0.0, 0.0)]);
        assert_eq!(
            do_retranslocation(&mut bat, AllocationPolicy::PriorityAllocation, TOL).unwrap(),
            0.0
        );
        assert_eq!(bat.allocated, 0.0);
    }

    #[test]
    fn test_uptake_fills_demand_after_reallocation() {
        let supplies = [
            BiomassSupply {
                uptake: 5.0,
                reallocation: 1.0,
                ..Default::default()
            },
            BiomassSupply::default(),
        ];
        let mut bat = record(&supplies, &[(0.0, 0.0, 0.0), (2.0, 1.0, 0.0)]);

        do_reallocation(&mut bat, AllocationPolicy::PriorityAllocation, TOL).unwrap();
        let taken_up = do_uptake(&mut bat, AllocationPolicy::PriorityAllocation, TOL).unwrap();

        assert!((taken_up - 2.0).abs() < 1e-12);
        assert!((bat.uptake[0] - 2.0).abs() < 1e-12);
        assert!((bat.allocated - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_fixation_sets_sink_limitation_and_respiration() {
        let supplies = [
            BiomassSupply::default(),
            BiomassSupply {
                fixation: 4.0,
                ..Default::default()
            },
        ];
        let mut bat = record(&supplies, &[(1.0, 0.0, 0.0), (0.0, 0.0, 0.0)]);

        let respiration =
            do_fixation(&mut bat, AllocationPolicy::RelativeAllocation, &[0.0, 6.0], TOL).unwrap();

        assert!((bat.fixation[1] - 1.0).abs() < 1e-12);
        assert!((bat.sink_limitation - 3.0).abs() < 1e-12);
        assert_eq!(respiration, vec![0.0, 6.0]);
    }

    #[test]
    fn test_retranslocation_skips_reserves_already_used() {
        let supplies = [BiomassSupply {
            retranslocation: 4.0,
            ..Default::default()
        }];
        let mut bat = record(&supplies, &[(10.0, 0.0, 0.0)]);
        bat.retranslocation[0] = 3.0;

        let retranslocated =
            do_retranslocation(&mut bat, AllocationPolicy::RelativeAllocation, TOL).unwrap();

        assert!((retranslocated - 1.0).abs() < 1e-12);
        assert!((bat.retranslocation[0] - 4.0).abs() < 1e-12);
        assert!((bat.structural_allocation[0] - 1.0).abs() < 1e-12);
    }
}
