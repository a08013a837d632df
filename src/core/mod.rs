pub mod calendar;
pub mod config;
pub mod error;
pub mod types;

pub use calendar::{CropCalendar, CropEvent};
