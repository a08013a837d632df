//! Fixation respiration clawback
//!
//! Fixing a resource costs DM. The cost is paid first from DM that no organ
//! wanted today (sink limitation), then clawed back in strict order:
//! 1. non-structural DM already allocated today, pro rata
//! 2. retranslocation supply not yet used, pro rata
//! 3. structural and metabolic DM allocated today, pro rata, keeping each
//!    organ's structural:metabolic mix

use super::record::BiomassArbitration;
use crate::core::error::{ArbitrationError, Result};
use crate::core::types::{divide_or_zero, NutrientKind};

/// Charge per-organ fixation respiration against the DM record
///
/// `fixing` is the resource whose fixation incurred the cost; it only
/// labels the error raised when the cost cannot be met.
pub fn charge_fixation_respiration(
    dm: &mut BiomassArbitration,
    respiration: &[f64],
    fixing: NutrientKind,
    tolerance: f64,
) -> Result<()> {
    let total: f64 = respiration.iter().sum();
    if total <= 0.0 {
        return Ok(());
    }
    for (organ, cost) in dm.respiration.iter_mut().zip(respiration) {
        *organ += cost;
    }

    let from_sink = total.min(dm.sink_limitation.max(0.0));
    dm.sink_limitation -= from_sink;
    let mut unmet = total - from_sink;

    if unmet > 0.0 {
        unmet -= claw_back_non_structural(dm, unmet);
    }
    if unmet > 0.0 {
        unmet -= remobilise_reserves(dm, unmet);
    }
    if unmet > 0.0 {
        unmet -= claw_back_structural_metabolic(dm, unmet);
    }
    dm.refresh_allocation_totals();

    if unmet > tolerance {
        return Err(ArbitrationError::ExcessiveFixation {
            kind: fixing,
            shortfall: unmet,
        });
    }
    tracing::debug!(
        "Fixation respiration {:.6} paid ({:.6} from sink limitation)",
        total,
        from_sink
    );
    Ok(())
}

fn claw_back_non_structural(dm: &mut BiomassArbitration, cost: f64) -> f64 {
    let total: f64 = dm.non_structural_allocation.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut met = 0.0;
    for allocation in dm.non_structural_allocation.iter_mut() {
        let proportion = *allocation / total;
        let clawback = (cost * proportion).min(*allocation);
        *allocation -= clawback;
        met += clawback;
    }
    met
}

fn remobilise_reserves(dm: &mut BiomassArbitration, cost: f64) -> f64 {
    let unused: Vec<f64> = dm
        .retranslocation_supply
        .iter()
        .zip(&dm.retranslocation)
        .map(|(supply, used)| (supply - used).max(0.0))
        .collect();
    let total: f64 = unused.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut met = 0.0;
    for (retranslocated, available) in dm.retranslocation.iter_mut().zip(&unused) {
        let taken = (cost * available / total).min(*available);
        *retranslocated += taken;
        met += taken;
    }
    met
}

fn claw_back_structural_metabolic(dm: &mut BiomassArbitration, cost: f64) -> f64 {
    let total: f64 = dm
        .structural_allocation
        .iter()
        .zip(&dm.metabolic_allocation)
        .map(|(s, m)| s + m)
        .sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut met = 0.0;
    for i in 0..dm.organ_count() {
        let organ_total = dm.structural_allocation[i] + dm.metabolic_allocation[i];
        if organ_total <= 0.0 {
            continue;
        }
        let proportion = organ_total / total;
        let structural_fraction = divide_or_zero(dm.structural_allocation[i], organ_total);
        let share = cost * proportion;
        let structural = (share * structural_fraction).min(dm.structural_allocation[i]);
        let metabolic = (share * (1.0 - structural_fraction)).min(dm.metabolic_allocation[i]);
        dm.structural_allocation[i] -= structural;
        dm.metabolic_allocation[i] -= metabolic;
        met += structural + metabolic;
    }
    met
}
