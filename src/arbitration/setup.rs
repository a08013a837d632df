//! Daily record setup
//!
//! Crops that need a different setup supply their own `SetupStrategy` to
//! the arbitrator instead of overriding the standard one.

use std::fmt;

use super::record::BiomassArbitration;
use crate::core::error::{ArbitrationError, Result};
use crate::core::types::NutrientKind;
use crate::organ::{BiomassDemand, BiomassSupply, Organ};

/// Builds the day's arbitration records from the organs
pub trait SetupStrategy: fmt::Debug + Send + Sync {
    /// DM record, with total plant supply known immediately
    fn dm_setup(&self, organs: &[Box<dyn Organ>]) -> Result<BiomassArbitration> {
        standard_setup(organs, NutrientKind::Dm, true)
    }

    /// Nutrient record; uptake supply is left at zero until the soil
    /// arbitrator has answered
    fn nutrient_setup(
        &self,
        organs: &[Box<dyn Organ>],
        kind: NutrientKind,
    ) -> Result<BiomassArbitration> {
        standard_setup(organs, kind, false)
    }
}

/// Setup shared by all crops unless they say otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardSetup;

impl SetupStrategy for StandardSetup {}

/// Pull supply and demand from every organ into a fresh record
///
/// Records the organs' current live plus dead pool as the day's starting
/// mass. Negative or non-finite organ inputs are rejected.
pub fn standard_setup(
    organs: &[Box<dyn Organ>],
    kind: NutrientKind,
    include_uptake: bool,
) -> Result<BiomassArbitration> {
    let mut supplies = Vec::with_capacity(organs.len());
    let mut demands = Vec::with_capacity(organs.len());
    for organ in organs {
        let mut supply = organ.supply(kind);
        let demand = organ.demand(kind);
        validate_inputs(organ.name(), kind, &supply, &demand)?;
        if !include_uptake {
            supply.uptake = 0.0;
        }
        supplies.push(supply);
        demands.push(demand);
    }

    let mut bat = BiomassArbitration::from_parts(kind, &supplies, &demands);
    bat.start = organs.iter().map(|o| o.pool_amount(kind)).sum();
    bat.check_demand_consistency()?;
    Ok(bat)
}

fn validate_inputs(
    organ: &str,
    kind: NutrientKind,
    supply: &BiomassSupply,
    demand: &BiomassDemand,
) -> Result<()> {
    let fields = [
        ("reallocation supply", supply.reallocation),
        ("uptake supply", supply.uptake),
        ("fixation supply", supply.fixation),
        ("retranslocation supply", supply.retranslocation),
        ("structural demand", demand.structural),
        ("metabolic demand", demand.metabolic),
        ("non-structural demand", demand.non_structural),
    ];
    for (field, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(ArbitrationError::InvalidOrganInput {
                kind,
                organ: organ.to_string(),
                field,
                value,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organ::{OrganParams, SimpleOrgan};

    fn organs() -> Vec<Box<dyn Organ>> {
        vec![
            Box::new(SimpleOrgan::new(OrganParams {
                name: "leaf".into(),
                photosynthesis: 10.0,
                dm_demand: BiomassDemand {
                    structural: 3.0,
                    metabolic: 1.0,
                    non_structural: 0.0,
                },
                initial_wt: 20.0,
                ..Default::default()
            })),
            Box::new(SimpleOrgan::new(OrganParams {
                name: "stem".into(),
                dm_demand: BiomassDemand {
                    structural: 1.0,
                    metabolic: 0.0,
                    non_structural: 5.0,
                },
                initial_wt: 30.0,
                ..Default::default()
            })),
        ]
    }

    #[test]
    fn test_dm_setup() {
        let bat = StandardSetup.dm_setup(&organs()).unwrap();
        assert_eq!(bat.kind, NutrientKind::Dm);
        assert_eq!(bat.start, 50.0);
        assert_eq!(bat.total_plant_supply, 10.0);
        assert_eq!(bat.total_plant_demand, 10.0);
        assert_eq!(bat.relative_structural_demand, vec![0.75, 0.25]);
        assert_eq!(bat.allocated, 0.0);
    }

    #[test]
    fn test_nutrient_setup_starts_from_organ_n() {
        let bat = StandardSetup.nutrient_setup(&organs(), NutrientKind::N).unwrap();
        // initial N at critical concentration of 2%
        assert!((bat.start - 1.0).abs() < 1e-12);
        assert_eq!(bat.total_uptake_supply, 0.0);
    }

    #[test]
    fn test_negative_demand_rejected() {
        let organs: Vec<Box<dyn Organ>> = vec![Box::new(SimpleOrgan::new(OrganParams {
            name: "grain".into(),
            dm_demand: BiomassDemand {
                structural: -1.0,
                ..Default::default()
            },
            ..Default::default()
        }))];
        let result = StandardSetup.dm_setup(&organs);
        assert!(matches!(
            result,
            Err(ArbitrationError::InvalidOrganInput { field: "structural demand", .. })
        ));
    }
}
