//! A plant: its organs, its arbitrator and its crop calendar

use ahash::AHashMap;

use crate::arbitration::{ArbitrationSummary, OrganArbitrator};
use crate::core::error::{ArbitrationError, Result};
use crate::core::types::{Day, NutrientKind};
use crate::core::{CropCalendar, CropEvent};
use crate::organ::{DailyConditions, Organ};
use crate::soil::{SoilZone, ZoneUptake};

#[derive(Debug)]
pub struct Plant {
    pub name: String,
    /// Area the plant occupies (ha)
    pub area: f64,
    pub organs: Vec<Box<dyn Organ>>,
    pub arbitrator: OrganArbitrator,
    pub calendar: CropCalendar,
    emerged: bool,
    organ_index: AHashMap<String, usize>,
}

impl Plant {
    pub fn new(
        name: impl Into<String>,
        area: f64,
        organs: Vec<Box<dyn Organ>>,
        arbitrator: OrganArbitrator,
        calendar: CropCalendar,
    ) -> Result<Self> {
        let name = name.into();
        if !(area.is_finite() && area > 0.0) {
            return Err(ArbitrationError::InvalidScenario(format!(
                "plant {} has invalid area {}",
                name, area
            )));
        }

        let mut organ_index = AHashMap::with_capacity(organs.len());
        for (i, organ) in organs.iter().enumerate() {
            if organ_index.insert(organ.name().to_string(), i).is_some() {
                return Err(ArbitrationError::InvalidScenario(format!(
                    "plant {} has two organs named {}",
                    name,
                    organ.name()
                )));
            }
        }

        Ok(Self {
            name,
            area,
            organs,
            arbitrator,
            calendar,
            emerged: false,
            organ_index,
        })
    }

    pub fn organ(&self, name: &str) -> Option<&dyn Organ> {
        self.organ_index.get(name).map(|&i| self.organs[i].as_ref())
    }

    pub fn is_emerged(&self) -> bool {
        self.emerged
    }

    /// Live DM or N summed over all organs
    pub fn live_amount(&self, kind: NutrientKind) -> f64 {
        self.organs.iter().map(|o| o.live().amount(kind)).sum()
    }

    pub fn dead_amount(&self, kind: NutrientKind) -> f64 {
        self.organs.iter().map(|o| o.dead().amount(kind)).sum()
    }

    pub fn handle_event(&mut self, event: CropEvent) {
        match event {
            CropEvent::SimulationCommencing => {
                self.arbitrator.clear();
            }
            CropEvent::Sowing => {
                tracing::info!("{} sown on day {}", self.name, self.calendar.current_day());
            }
            CropEvent::Emergence => {
                self.emerged = true;
                tracing::info!("{} emerged on day {}", self.name, self.calendar.current_day());
            }
            CropEvent::EndCrop => {
                self.emerged = false;
                self.arbitrator.clear();
                tracing::info!("{} ended on day {}", self.name, self.calendar.current_day());
            }
        }
    }

    pub(crate) fn start_day(&mut self, conditions: &DailyConditions, day: Day) -> Result<()> {
        for organ in &mut self.organs {
            organ.start_day(conditions);
        }
        self.arbitrator
            .do_potential_partitioning(&mut self.organs)
            .map_err(|e| e.on_day(&self.name, day))
    }

    pub(crate) fn water_requests(
        &mut self,
        zones: &[SoilZone],
        day: Day,
    ) -> Result<Vec<ZoneUptake>> {
        self.arbitrator
            .water_uptake_estimates(&self.organs, zones, self.area)
            .map_err(|e| e.on_day(&self.name, day))
    }

    pub(crate) fn receive_water(&mut self, granted: &[ZoneUptake], day: Day) -> Result<()> {
        self.arbitrator
            .set_water_allocation(&mut self.organs, granted, self.area)
            .map_err(|e| e.on_day(&self.name, day))
    }

    pub(crate) fn nitrogen_requests(
        &mut self,
        zones: &[SoilZone],
        day: Day,
    ) -> Result<Vec<ZoneUptake>> {
        self.arbitrator
            .nitrogen_uptake_estimates(&self.organs, zones, self.area)
            .map_err(|e| e.on_day(&self.name, day))
    }

    pub(crate) fn receive_nitrogen(&mut self, granted: &[ZoneUptake], day: Day) -> Result<()> {
        self.arbitrator
            .set_nitrogen_allocation(granted, self.area)
            .map_err(|e| e.on_day(&self.name, day))
    }

    pub(crate) fn finish_day(&mut self, day: Day) -> Result<ArbitrationSummary> {
        self.arbitrator
            .do_actual_partitioning(&mut self.organs)
            .map_err(|e| e.on_day(&self.name, day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ArbitratorConfig;
    use crate::organ::{OrganParams, SimpleOrgan};

    fn organ(name: &str) -> Box<dyn Organ> {
        Box::new(SimpleOrgan::new(OrganParams {
            name: name.into(),
            ..Default::default()
        }))
    }

    fn arbitrator() -> OrganArbitrator {
        OrganArbitrator::new(ArbitratorConfig::default()).unwrap()
    }

    fn single_leaf() -> Plant {
        Plant::new("wheat", 1.0, vec![organ("leaf")], arbitrator(), CropCalendar::default())
            .unwrap()
    }

    #[test]
    fn test_duplicate_organ_names_rejected() {
        let result = Plant::new(
            "wheat",
            1.0,
            vec![organ("leaf"), organ("leaf")],
            arbitrator(),
            CropCalendar::default(),
        );
        assert!(matches!(result, Err(ArbitrationError::InvalidScenario(_))));
    }

    #[test]
    fn test_organ_lookup_by_name() {
        let plant = Plant::new(
            "wheat",
            1.0,
            vec![organ("leaf"), organ("root")],
            arbitrator(),
            CropCalendar::default(),
        )
        .unwrap();
        assert_eq!(plant.organ("root").map(|o| o.name()), Some("root"));
        assert!(plant.organ("grain").is_none());
    }

    #[test]
    fn test_emergence_and_end_crop() {
        let mut plant = single_leaf();
        assert!(!plant.is_emerged());

        plant.handle_event(CropEvent::Emergence);
        assert!(plant.is_emerged());
        plant.start_day(&DailyConditions::default(), 0).unwrap();
        assert!(plant.arbitrator.dm().is_some());

        plant.handle_event(CropEvent::EndCrop);
        assert!(!plant.is_emerged());
        assert!(plant.arbitrator.dm().is_none(), "end of crop should discard records");
    }

    #[test]
    fn test_errors_carry_crop_and_day() {
        let mut plant = single_leaf();
        let err = plant.finish_day(7).unwrap_err();
        assert!(matches!(
            err,
            ArbitrationError::Day { ref crop, day: 7, .. } if crop == "wheat"
        ));
    }
}
