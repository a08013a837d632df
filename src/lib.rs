//! Crop Arbitrator - daily biomass and nitrogen arbitration between plant organs

pub mod arbitration;
pub mod core;
pub mod organ;
pub mod simulation;
pub mod soil;
