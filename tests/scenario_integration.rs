//! Integration tests for scenario files and the multi-plant driver
//!
//! These tests load the bundled scenario and run it end to end:
//! - Crop events drive when each plant is arbitrated
//! - Plants compete for the same soil N and water
//! - Reports serialize to JSON

use std::path::Path;

use crop_arbitrator::core::CropEvent;
use crop_arbitrator::organ::DailyConditions;
use crop_arbitrator::simulation::Scenario;

fn wheat_clover() -> Scenario {
    Scenario::load_from_toml(Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/data/scenarios/wheat.toml"
    )))
    .unwrap()
}

#[test]
fn test_bundled_scenario_loads() {
    let scenario = wheat_clover();
    assert_eq!(scenario.plants.len(), 2);
    assert_eq!(scenario.zones.len(), 2);
    assert_eq!(scenario.days, 40);
}

#[test]
fn test_bundled_scenario_runs_to_the_end() {
    let scenario = wheat_clover();
    let mut sim = scenario.build().unwrap();

    let reports = sim
        .run(scenario.days, &scenario.conditions)
        .unwrap_or_else(|e| panic!("scenario failed: {}", e));
    assert_eq!(reports.len(), 40);

    // wheat emerges on day 3 and ends on day 35
    let wheat = |day: usize| &reports[day].plants[0];
    assert!(wheat(2).summary.is_none());
    assert!(wheat(3).events.contains(&CropEvent::Emergence));
    assert!(wheat(3).summary.is_some());
    assert_eq!(wheat(3).days_after_sowing, Some(3));
    assert!(wheat(35).events.contains(&CropEvent::EndCrop));
    assert!(wheat(36).summary.is_none());

    // clover keeps going after the wheat has finished
    assert!(reports[39].plants[1].summary.is_some());
    assert!(reports[39].plants[1].live_wt > reports[1].plants[1].live_wt);

    // soil N only ever goes down
    for pair in reports.windows(2) {
        assert!(pair[1].soil_mineral_n <= pair[0].soil_mineral_n + 1e-12);
    }
}

#[test]
fn test_runs_are_reproducible() {
    let scenario = wheat_clover();
    let run = || {
        let mut sim = scenario.build().unwrap();
        sim.run(12, &DailyConditions::default()).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_reports_serialize_to_json() {
    let scenario = wheat_clover();
    let mut sim = scenario.build().unwrap();
    let reports = sim.run(5, &scenario.conditions).unwrap();

    let json = serde_json::to_string(&reports).unwrap();
    assert!(json.contains("\"crop\":\"wheat\""));
    assert!(json.contains("nutrient_limitation"));
}
