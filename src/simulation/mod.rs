//! Daily driver for one or more plants sharing a soil
//!
//! Each day: crop events -> potential partitioning -> water and N uptake
//! requests -> soil arbitration -> actual partitioning -> reports.
//!
//! Plants are independent except through the soil, so the per-plant
//! phases run in parallel with rayon.

pub mod plant;
pub mod scenario;

pub use plant::Plant;
pub use scenario::{PlantDefinition, Scenario};

use rayon::prelude::*;
use serde::Serialize;

use crate::arbitration::ArbitrationSummary;
use crate::core::error::Result;
use crate::core::types::{Day, NutrientKind};
use crate::core::CropEvent;
use crate::organ::DailyConditions;
use crate::soil::SoilArbitrator;

/// One plant's outcome for one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantReport {
    pub crop: String,
    pub events: Vec<CropEvent>,
    pub days_after_sowing: Option<Day>,
    pub emerged: bool,
    /// None on days the plant was not arbitrated
    pub summary: Option<ArbitrationSummary>,
    pub live_wt: f64,
    pub live_n: f64,
    pub dead_wt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub day: Day,
    pub plants: Vec<PlantReport>,
    /// Mineral N left in the soil after uptake (kg/ha summed over zones)
    pub soil_mineral_n: f64,
    pub soil_water: f64,
}

#[derive(Debug)]
pub struct Simulation {
    pub plants: Vec<Plant>,
    pub soil: SoilArbitrator,
    day: Day,
}

impl Simulation {
    pub fn new(plants: Vec<Plant>, soil: SoilArbitrator) -> Self {
        Self { plants, soil, day: 0 }
    }

    pub fn day(&self) -> Day {
        self.day
    }

    /// Advance every plant by one day
    pub fn run_day(&mut self, conditions: &DailyConditions) -> Result<DailyReport> {
        let day = self.day;

        let mut events = Vec::with_capacity(self.plants.len());
        for plant in &mut self.plants {
            let today = plant.calendar.events_today();
            for event in &today {
                plant.handle_event(*event);
            }
            events.push(today);
        }

        let active: Vec<usize> = (0..self.plants.len())
            .filter(|&i| self.plants[i].is_emerged())
            .collect();

        self.plants
            .par_iter_mut()
            .filter(|p| p.is_emerged())
            .try_for_each(|plant| plant.start_day(conditions, day))?;

        // Water and N go through the soil one plant list at a time so every
        // plant competes for the same layers
        let requests = active
            .iter()
            .map(|&i| self.plants[i].water_requests(&self.soil.zones, day))
            .collect::<Result<Vec<_>>>()?;
        let grants = self.soil.allocate_water(&requests);
        for (&i, granted) in active.iter().zip(&grants) {
            self.plants[i].receive_water(granted, day)?;
        }

        let requests = active
            .iter()
            .map(|&i| self.plants[i].nitrogen_requests(&self.soil.zones, day))
            .collect::<Result<Vec<_>>>()?;
        let grants = self.soil.allocate_nitrogen(&requests);
        for (&i, granted) in active.iter().zip(&grants) {
            self.plants[i].receive_nitrogen(granted, day)?;
        }

        let summaries: Vec<Option<ArbitrationSummary>> = self
            .plants
            .par_iter_mut()
            .map(|plant| {
                if plant.is_emerged() {
                    plant.finish_day(day).map(Some)
                } else {
                    Ok(None)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let plants = self
            .plants
            .iter()
            .zip(events)
            .zip(summaries)
            .map(|((plant, events), summary)| PlantReport {
                crop: plant.name.clone(),
                events,
                days_after_sowing: plant.calendar.days_after_sowing(),
                emerged: plant.is_emerged(),
                summary,
                live_wt: plant.live_amount(NutrientKind::Dm),
                live_n: plant.live_amount(NutrientKind::N),
                dead_wt: plant.dead_amount(NutrientKind::Dm),
            })
            .collect();

        let report = DailyReport {
            day,
            plants,
            soil_mineral_n: self.soil.zones.iter().map(|z| z.mineral_n()).sum(),
            soil_water: self.soil.zones.iter().map(|z| z.water()).sum(),
        };

        for plant in &mut self.plants {
            plant.calendar.advance();
        }
        self.day += 1;
        tracing::debug!(
            "Day {} complete: {} of {} plants arbitrated",
            day,
            active.len(),
            self.plants.len()
        );
        Ok(report)
    }

    /// Run `days` days with the same conditions every day
    pub fn run(&mut self, days: Day, conditions: &DailyConditions) -> Result<Vec<DailyReport>> {
        (0..days).map(|_| self.run_day(conditions)).collect()
    }
}
