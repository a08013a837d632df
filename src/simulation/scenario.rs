//! Scenario files
//!
//! A scenario is a TOML file describing the soil, the plants and their
//! organs, and the arbitrator settings. See `data/scenarios/` for examples.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Plant, Simulation};
use crate::arbitration::OrganArbitrator;
use crate::core::config::ArbitratorConfig;
use crate::core::error::{ArbitrationError, Result};
use crate::core::types::Day;
use crate::core::CropCalendar;
use crate::organ::{DailyConditions, Organ, OrganParams, SimpleOrgan};
use crate::soil::{SoilArbitrator, SoilZone};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Days to simulate when the caller does not say otherwise
    #[serde(default = "default_days")]
    pub days: Day,
    /// Settings shared by every plant without its own
    #[serde(default)]
    pub arbitrator: ArbitratorConfig,
    #[serde(default)]
    pub conditions: DailyConditions,
    #[serde(default)]
    pub zones: Vec<SoilZone>,
    pub plants: Vec<PlantDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantDefinition {
    pub name: String,
    /// Area the plant occupies (ha)
    #[serde(default = "default_area")]
    pub area: f64,
    #[serde(default)]
    pub sowing_day: Day,
    #[serde(default)]
    pub emergence_day: Day,
    #[serde(default)]
    pub end_day: Option<Day>,
    /// Overrides the scenario-wide arbitrator settings
    #[serde(default)]
    pub arbitrator: Option<ArbitratorConfig>,
    pub organs: Vec<OrganParams>,
}

fn default_days() -> Day {
    30
}

fn default_area() -> f64 {
    1.0
}

impl Scenario {
    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.plants.is_empty() {
            return Err(ArbitrationError::InvalidScenario("no plants defined".to_string()));
        }
        self.arbitrator.validate()?;

        let mut zone_names = AHashSet::new();
        for zone in &self.zones {
            if !zone_names.insert(zone.name.as_str()) {
                return Err(ArbitrationError::InvalidScenario(format!(
                    "duplicate soil zone {}",
                    zone.name
                )));
            }
            if !(zone.area.is_finite() && zone.area > 0.0) {
                return Err(ArbitrationError::InvalidScenario(format!(
                    "soil zone {} has invalid area {}",
                    zone.name, zone.area
                )));
            }
        }

        let mut plant_names = AHashSet::new();
        for plant in &self.plants {
            if !plant_names.insert(plant.name.as_str()) {
                return Err(ArbitrationError::InvalidScenario(format!(
                    "duplicate plant {}",
                    plant.name
                )));
            }
            if plant.organs.is_empty() {
                return Err(ArbitrationError::InvalidScenario(format!(
                    "plant {} has no organs",
                    plant.name
                )));
            }
            if let Some(config) = &plant.arbitrator {
                config.validate()?;
            }
        }
        Ok(())
    }

    /// Build the plants and soil ready to run
    pub fn build(&self) -> Result<Simulation> {
        let plants = self
            .plants
            .iter()
            .map(|plant| plant.build(&self.arbitrator))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(
            "Scenario '{}': {} plants on {} soil zones",
            self.name,
            plants.len(),
            self.zones.len()
        );
        Ok(Simulation::new(plants, SoilArbitrator::new(self.zones.clone())))
    }
}

impl PlantDefinition {
    fn build(&self, default_config: &ArbitratorConfig) -> Result<Plant> {
        let config = self.arbitrator.clone().unwrap_or_else(|| default_config.clone());
        let organs: Vec<Box<dyn Organ>> = self
            .organs
            .iter()
            .map(|params| Box::new(SimpleOrgan::new(params.clone())) as Box<dyn Organ>)
            .collect();

        let mut calendar = CropCalendar::new(self.sowing_day, self.emergence_day);
        if let Some(end_day) = self.end_day {
            calendar = calendar.with_end_day(end_day);
        }
        Plant::new(
            self.name.clone(),
            self.area,
            organs,
            OrganArbitrator::new(config)?,
            calendar,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::AllocationPolicy;

    const SCENARIO: &str = r#"
        name = "test"
        days = 5

        [arbitrator]
        n_policy = "PriorityAllocation"

        [[zones]]
        name = "field"
        area = 1.0
        [[zones.layers]]
        thickness = 100.0
        no3n = 20.0

        [[plants]]
        name = "wheat"
        emergence_day = 1
        [[plants.organs]]
        name = "leaf"
        photosynthesis = 5.0
        initial_wt = 10.0
        [plants.organs.dm_demand]
        structural = 3.0

        [[plants]]
        name = "weed"
        [plants.arbitrator]
        dm_policy = "RelativeAllocationSinglePass"
        [[plants.organs]]
        name = "shoot"
    "#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::parse_toml(SCENARIO).unwrap();
        assert_eq!(scenario.days, 5);
        assert_eq!(scenario.arbitrator.n_policy, AllocationPolicy::PriorityAllocation);
        assert_eq!(scenario.arbitrator.dm_policy, AllocationPolicy::RelativeAllocation);
        assert_eq!(scenario.zones[0].layers[0].no3n, 20.0);
        assert_eq!(scenario.plants[0].area, 1.0);
        assert_eq!(scenario.plants[0].organs[0].dm_demand.structural, 3.0);
        assert_eq!(scenario.conditions.radiation_factor, 1.0);
    }

    #[test]
    fn test_plant_config_override() {
        let scenario = Scenario::parse_toml(SCENARIO).unwrap();
        let sim = scenario.build().unwrap();
        assert_eq!(sim.plants.len(), 2);
        assert_eq!(
            sim.plants[1].arbitrator.config().dm_policy,
            AllocationPolicy::RelativeAllocationSinglePass
        );
        assert_eq!(
            sim.plants[0].arbitrator.config().n_policy,
            AllocationPolicy::PriorityAllocation
        );
    }

    #[test]
    fn test_duplicate_plant_rejected() {
        let toml = r#"
            [[plants]]
            name = "wheat"
            [[plants.organs]]
            name = "leaf"
            [[plants]]
            name = "wheat"
            [[plants.organs]]
            name = "leaf"
        "#;
        assert!(matches!(
            Scenario::parse_toml(toml),
            Err(ArbitrationError::InvalidScenario(_))
        ));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let toml = r#"
            [arbitrator]
            dm_policy = "Greedy"
            [[plants]]
            name = "wheat"
            [[plants.organs]]
            name = "leaf"
        "#;
        assert!(Scenario::parse_toml(toml).is_err());
    }
}
