//! Biomass and nitrogen arbitration between organs

pub mod constraint;
pub mod fixation;
pub mod orchestrator;
pub mod policy;
pub mod record;
pub mod setup;
pub mod supply;
pub mod uptake;

pub use orchestrator::{ArbitrationPhase, ArbitrationSummary, NutrientSummary, OrganArbitrator};
pub use policy::AllocationPolicy;
pub use record::BiomassArbitration;
pub use setup::{SetupStrategy, StandardSetup};
pub use uptake::WaterArbitration;
