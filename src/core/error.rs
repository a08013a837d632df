use thiserror::Error;

use crate::core::types::{Day, NutrientKind, Tranche};

#[derive(Error, Debug)]
pub enum ArbitrationError {
    #[error("Negative {kind} {tranche} allocation for organ {organ}: {value}")]
    NegativeAllocation {
        kind: NutrientKind,
        organ: usize,
        tranche: Tranche,
        value: f64,
    },

    #[error("{kind} policy allocated {allocated} from a supply of {supply}")]
    OverAllocation {
        kind: NutrientKind,
        supply: f64,
        allocated: f64,
    },

    #[error("Invalid {kind} supply to arbitrate: {supply}")]
    InvalidSupply { kind: NutrientKind, supply: f64 },

    #[error("Organ {organ} declared an invalid {kind} {field}: {value}")]
    InvalidOrganInput {
        kind: NutrientKind,
        organ: String,
        field: &'static str,
        value: f64,
    },

    #[error("Mass balance error in {kind} allocation ({check}): {error} exceeds {tolerance}")]
    MassBalance {
        kind: NutrientKind,
        check: &'static str,
        error: f64,
        tolerance: f64,
    },

    #[error(
        "Crop is trying to fix excessive amounts of {kind}: {shortfall} of respiration cost \
         could not be met. Check fixation rates and partitioning to the fixing organ"
    )]
    ExcessiveFixation { kind: NutrientKind, shortfall: f64 },

    #[error("{kind} total demand of organ {organ} does not equal the sum of its tranches")]
    DemandMismatch { kind: NutrientKind, organ: usize },

    #[error("{0} arbitration has not been set up for today")]
    NotSetUp(NutrientKind),

    #[error("Cannot run {operation} during phase {phase}")]
    PhaseOrder {
        operation: &'static str,
        phase: String,
    },

    #[error("Unknown allocation policy: {0}")]
    UnknownPolicy(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("{crop} failed on day {day}: {source}")]
    Day {
        crop: String,
        day: Day,
        #[source]
        source: Box<ArbitrationError>,
    },
}

impl ArbitrationError {
    /// Attach the crop name and simulation day to a failure
    pub fn on_day(self, crop: &str, day: Day) -> Self {
        ArbitrationError::Day {
            crop: crop.to_string(),
            day,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArbitrationError>;
