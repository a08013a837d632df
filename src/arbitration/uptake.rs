//! Soil uptake adapter
//!
//! Translates organ-level uptake supply into per-zone, per-layer requests
//! for the soil arbitrator, and translates the soil arbitrator's grant back
//! into organ uptake supply. Soil amounts are kg/ha (N) and mm (water) per
//! zone; zone totals are weighted by zone area (ha) and divided by the
//! plant's area before converting to plant units.

use serde::Serialize;

use super::record::BiomassArbitration;
use crate::core::types::divide_or_zero;
use crate::organ::Organ;
use crate::soil::{LayeredNitrogen, SoilZone, ZoneUptake};

/// Water figures for one day, kept between the estimate and the grant
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaterArbitration {
    /// Plant water demand (mm)
    pub demand: f64,
    /// Unscaled potential uptake over all organs (mm)
    pub potential_supply: f64,
    /// Each organ's unscaled potential uptake (mm)
    pub organ_supply: Vec<f64>,
    /// Water granted by the soil arbitrator (mm)
    pub uptake: f64,
}

impl WaterArbitration {
    /// Uptake as a fraction of demand, 1.0 when nothing was demanded
    pub fn supply_demand_ratio(&self) -> f64 {
        if self.demand > 0.0 {
            (self.uptake / self.demand).min(1.0)
        } else {
            1.0
        }
    }
}

/// Compute the plant's N uptake request for each zone
///
/// Sets each organ's potential uptake supply on the N record, then scales
/// the request down so it never exceeds the demand reallocation has not
/// already met.
pub fn nitrogen_uptake_estimates(
    organs: &[Box<dyn Organ>],
    n: &mut BiomassArbitration,
    zones: &[SoilZone],
    plant_area: f64,
    kgha_to_gsm: f64,
) -> Vec<ZoneUptake> {
    let mut requests: Vec<ZoneUptake> = zones
        .iter()
        .map(|zone| {
            let mut request = ZoneUptake::for_zone(zone);
            request.nitrogen = LayeredNitrogen::zeros(zone.layer_count());
            request
        })
        .collect();

    for (i, organ) in organs.iter().enumerate() {
        let mut organ_kg = 0.0;
        for (zone, request) in zones.iter().zip(requests.iter_mut()) {
            if let Some(supply) = organ.nitrogen_uptake_supply(zone) {
                add_layers(&mut request.nitrogen.no3n, &supply.no3n);
                add_layers(&mut request.nitrogen.nh4n, &supply.nh4n);
                organ_kg += supply.total() * zone.area;
            }
        }
        n.uptake_supply[i] = divide_or_zero(organ_kg, plant_area) * kgha_to_gsm;
    }
    n.refresh_supply_totals();

    let supply_kg: f64 = requests.iter().map(ZoneUptake::nitrogen_mass).sum();
    let unmet = n.total_plant_demand - n.total_reallocation;
    let demand_kg = (unmet / kgha_to_gsm * plant_area).max(0.0);
    if supply_kg > demand_kg {
        let ratio = divide_or_zero(demand_kg, supply_kg).min(1.0);
        for request in &mut requests {
            request.scale(ratio);
        }
    }
    requests
}

/// Replace each organ's potential uptake supply with its share of the N the
/// soil arbitrator granted
pub fn apply_nitrogen_grant(
    n: &mut BiomassArbitration,
    granted: &[ZoneUptake],
    plant_area: f64,
    kgha_to_gsm: f64,
) {
    let granted_kg: f64 = granted.iter().map(ZoneUptake::nitrogen_mass).sum();
    let granted_gsm = divide_or_zero(granted_kg, plant_area) * kgha_to_gsm;
    let potential_total = n.total_uptake_supply;
    for supply in n.uptake_supply.iter_mut() {
        *supply = granted_gsm * divide_or_zero(*supply, potential_total);
    }
    n.refresh_supply_totals();
}

/// Compute the plant's water request for each zone
pub fn water_uptake_estimates(
    organs: &[Box<dyn Organ>],
    zones: &[SoilZone],
    plant_area: f64,
) -> (WaterArbitration, Vec<ZoneUptake>) {
    let mut requests: Vec<ZoneUptake> = zones
        .iter()
        .map(|zone| {
            let mut request = ZoneUptake::for_zone(zone);
            request.water = vec![0.0; zone.layer_count()];
            request
        })
        .collect();

    let mut water = WaterArbitration {
        demand: organs.iter().map(|o| o.water_demand()).sum(),
        organ_supply: vec![0.0; organs.len()],
        ..Default::default()
    };

    for (i, organ) in organs.iter().enumerate() {
        let mut volume = 0.0;
        for (zone, request) in zones.iter().zip(requests.iter_mut()) {
            if let Some(supply) = organ.water_uptake_supply(zone) {
                add_layers(&mut request.water, &supply);
                volume += supply.iter().sum::<f64>() * zone.area;
            }
        }
        water.organ_supply[i] = divide_or_zero(volume, plant_area);
    }
    water.potential_supply = water.organ_supply.iter().sum();

    if water.potential_supply > water.demand {
        let ratio = divide_or_zero(water.demand, water.potential_supply).min(1.0);
        for request in &mut requests {
            request.scale(ratio);
        }
    }
    (water, requests)
}

/// Distribute granted water to organs in proportion to their potential
/// uptake
pub fn apply_water_grant(
    organs: &mut [Box<dyn Organ>],
    water: &mut WaterArbitration,
    granted: &[ZoneUptake],
    plant_area: f64,
) {
    let volume: f64 = granted.iter().map(ZoneUptake::water_volume).sum();
    water.uptake = divide_or_zero(volume, plant_area);
    for (organ, supply) in organs.iter_mut().zip(&water.organ_supply) {
        organ.set_water_uptake(water.uptake * divide_or_zero(*supply, water.potential_supply));
    }
}

fn add_layers(total: &mut [f64], layers: &[f64]) {
    for (t, v) in total.iter_mut().zip(layers) {
        *t += v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{NutrientKind, KGHA_TO_GSM};
    use crate::organ::{OrganParams, SimpleOrgan, UptakeParams};
    use crate::soil::SoilLayer;

    fn zone() -> SoilZone {
        SoilZone::new(
            "field",
            1.0,
            vec![
                SoilLayer {
                    thickness: 100.0,
                    no3n: 50.0,
                    nh4n: 10.0,
                    water: 20.0,
                },
                SoilLayer {
                    thickness: 100.0,
                    no3n: 30.0,
                    nh4n: 10.0,
                    water: 30.0,
                },
            ],
        )
    }

    fn root(water_demand: f64) -> Box<dyn Organ> {
        Box::new(SimpleOrgan::new(OrganParams {
            name: "root".into(),
            uptake: Some(UptakeParams {
                kno3: 0.1,
                knh4: 0.1,
                kl: 0.1,
                water_demand,
            }),
            ..Default::default()
        }))
    }

    fn leaf() -> Box<dyn Organ> {
        Box::new(SimpleOrgan::new(OrganParams {
            name: "leaf".into(),
            ..Default::default()
        }))
    }

    fn n_record(demand: f64) -> BiomassArbitration {
        let mut n = BiomassArbitration::new(NutrientKind::N, 2);
        n.structural_demand[1] = demand;
        n.total_demand[1] = demand;
        n.refresh_demand_totals();
        n
    }

    #[test]
    fn test_estimates_unscaled_when_demand_exceeds_supply() {
        let organs = vec![root(0.0), leaf()];
        let mut n = n_record(10.0);

        let requests = nitrogen_uptake_estimates(&organs, &mut n, &[zone()], 1.0, KGHA_TO_GSM);

        // 10% of 100 kg/ha = 10 kg/ha = 1 g/m²
        assert_eq!(requests[0].nitrogen.no3n, vec![5.0, 3.0]);
        assert!((n.uptake_supply[0] - 1.0).abs() < 1e-12);
        assert_eq!(n.uptake_supply[1], 0.0);
        assert!((n.total_uptake_supply - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_estimates_scaled_to_unmet_demand() {
        let organs = vec![root(0.0), leaf()];
        let mut n = n_record(0.5);
        n.total_reallocation = 0.25;

        let requests = nitrogen_uptake_estimates(&organs, &mut n, &[zone()], 1.0, KGHA_TO_GSM);

        // 0.25 g/m² unmet = 2.5 kg/ha of the 10 kg/ha available
        assert!((requests[0].nitrogen_mass() - 2.5).abs() < 1e-9);
        assert!((requests[0].nitrogen.no3n[0] - 1.25).abs() < 1e-9);
        // potential supply on the record stays unscaled
        assert!((n.total_uptake_supply - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_nothing_requested_when_reallocation_meets_demand() {
        let organs = vec![root(0.0), leaf()];
        let mut n = n_record(0.5);
        n.total_reallocation = 0.6;

        let requests = nitrogen_uptake_estimates(&organs, &mut n, &[zone()], 1.0, KGHA_TO_GSM);
        assert_eq!(requests[0].nitrogen_mass(), 0.0);
    }

    #[test]
    fn test_grant_shared_by_potential() {
        let mut n = BiomassArbitration::new(NutrientKind::N, 2);
        n.uptake_supply = vec![3.0, 1.0];
        n.refresh_supply_totals();
        let mut grant = ZoneUptake::for_zone(&zone());
        grant.area = 2.0;
        grant.nitrogen = LayeredNitrogen {
            no3n: vec![4.0, 0.0],
            nh4n: vec![0.0, 0.0],
        };

        // 8 kg over a 2 ha plant = 4 kg/ha = 0.4 g/m²
        apply_nitrogen_grant(&mut n, &[grant], 2.0, KGHA_TO_GSM);

        assert!((n.uptake_supply[0] - 0.3).abs() < 1e-12);
        assert!((n.uptake_supply[1] - 0.1).abs() < 1e-12);
        assert!((n.total_plant_supply - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_water_estimate_and_grant() {
        let mut organs = vec![root(2.0), leaf()];
        let (mut water, requests) = water_uptake_estimates(&organs, &[zone()], 1.0);

        assert_eq!(water.demand, 2.0);
        assert!((water.potential_supply - 5.0).abs() < 1e-12);
        assert!((requests[0].water.iter().sum::<f64>() - 2.0).abs() < 1e-12);

        let mut granted = requests.clone();
        granted[0].scale(0.5);
        apply_water_grant(&mut organs, &mut water, &granted, 1.0);

        assert!((water.uptake - 1.0).abs() < 1e-12);
        assert!((water.supply_demand_ratio() - 0.5).abs() < 1e-12);
    }
}
