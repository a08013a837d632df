//! Crop calendar for daily event scheduling
//!
//! Tracks the simulation day and tells the daily driver which crop events
//! (sowing, emergence, harvest) fall on it.

use serde::{Deserialize, Serialize};

use crate::core::types::Day;

/// Crop lifecycle events that drive the arbitrator's reset state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CropEvent {
    SimulationCommencing,
    Sowing,
    Emergence,
    EndCrop,
}

/// Calendar tracks simulation time with day granularity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropCalendar {
    day: Day,
    sowing_day: Day,
    emergence_day: Day,
    end_day: Option<Day>,
}

impl CropCalendar {
    pub fn new(sowing_day: Day, emergence_day: Day) -> Self {
        Self {
            day: 0,
            sowing_day,
            emergence_day: emergence_day.max(sowing_day),
            end_day: None,
        }
    }

    pub fn with_end_day(mut self, end_day: Day) -> Self {
        self.end_day = Some(end_day);
        self
    }

    pub fn advance(&mut self) {
        self.day += 1;
    }

    pub fn current_day(&self) -> Day {
        self.day
    }

    /// Days since sowing, or None before the crop is in the ground
    pub fn days_after_sowing(&self) -> Option<Day> {
        self.day.checked_sub(self.sowing_day)
    }

    /// Events that occur on the current day, in the order they must be handled
    pub fn events_today(&self) -> Vec<CropEvent> {
        let mut events = Vec::new();
        if self.day == 0 {
            events.push(CropEvent::SimulationCommencing);
        }
        if self.day == self.sowing_day {
            events.push(CropEvent::Sowing);
        }
        if self.day == self.emergence_day {
            events.push(CropEvent::Emergence);
        }
        if self.end_day == Some(self.day) {
            events.push(CropEvent::EndCrop);
        }
        events
    }
}

impl Default for CropCalendar {
    fn default() -> Self {
        Self::new(0, 0)
    }
}
