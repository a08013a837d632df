//! Nutrient-constrained DM allocation
//!
//! Potential DM allocation assumed nutrients were unlimited. Once N has been
//! allocated, each organ can only build as much DM as its N supports at the
//! organ's minimum N concentration.

use super::record::BiomassArbitration;
use crate::core::types::divide_or_zero;

/// Cap each organ's DM allocation at the growth its N allocation supports
///
/// The organ's tranche mix is preserved while the total shrinks. DM given up
/// is recorded as nutrient limitation and removed from the fixation channel,
/// since DM that no organ builds is never assimilated. Returns the nutrient
/// limitation.
pub fn constrain_dm_by_nutrient(
    dm: &mut BiomassArbitration,
    n: &mut BiomassArbitration,
    min_n_conc: &[f64],
) -> f64 {
    dm.refresh_allocation_totals();
    n.refresh_allocation_totals();
    let pre_constraint = dm.allocated;

    for i in 0..n.organ_count() {
        let n_allocated = n.total_allocation[i];
        let min_conc = min_n_conc.get(i).copied().unwrap_or(0.0);
        n.constrained_growth[i] = if n_allocated >= n.total_demand[i] || min_conc <= 0.0 {
            f64::INFINITY
        } else if n_allocated == 0.0 {
            0.0
        } else {
            n_allocated / min_conc
        };
    }

    for i in 0..dm.organ_count() {
        let organ_total = dm.total_allocation[i];
        let ceiling = n.constrained_growth.get(i).copied().unwrap_or(f64::INFINITY);
        if organ_total <= 0.0 || ceiling >= organ_total {
            continue;
        }
        let scale = ceiling / organ_total;
        dm.structural_allocation[i] =
            dm.structural_allocation[i].min(dm.structural_allocation[i] * scale);
        dm.metabolic_allocation[i] =
            dm.metabolic_allocation[i].min(dm.metabolic_allocation[i] * scale);
        dm.non_structural_allocation[i] =
            dm.non_structural_allocation[i].min(dm.non_structural_allocation[i] * scale);
    }

    dm.refresh_allocation_totals();
    let limitation = (pre_constraint - dm.allocated).max(0.0);
    dm.nutrient_limitation = limitation;
    release_fixation(dm, limitation);
    limitation
}

fn release_fixation(dm: &mut BiomassArbitration, amount: f64) {
    let total = dm.total_fixation;
    let released = amount.min(total);
    if released <= 0.0 {
        return;
    }
    for fixed in dm.fixation.iter_mut() {
        *fixed -= released * divide_or_zero(*fixed, total);
    }
    dm.refresh_allocation_totals();
}
