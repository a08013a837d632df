//! Biomass pool - DM and N held in one state (live or dead) of an organ

use serde::{Deserialize, Serialize};

use crate::core::types::{divide_or_zero, NutrientKind};

/// DM and N content of an organ pool, split by tranche (g/m²)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Biomass {
    pub structural_wt: f64,
    pub metabolic_wt: f64,
    pub non_structural_wt: f64,
    pub structural_n: f64,
    pub metabolic_n: f64,
    pub non_structural_n: f64,
}

impl Biomass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wt(&self) -> f64 {
        self.structural_wt + self.metabolic_wt + self.non_structural_wt
    }

    pub fn n(&self) -> f64 {
        self.structural_n + self.metabolic_n + self.non_structural_n
    }

    pub fn amount(&self, kind: NutrientKind) -> f64 {
        match kind {
            NutrientKind::Dm => self.wt(),
            NutrientKind::N => self.n(),
        }
    }

    /// N concentration (g N / g DM), zero when there is no DM
    pub fn n_conc(&self) -> f64 {
        divide_or_zero(self.n(), self.wt())
    }

    pub fn add(&mut self, other: &Biomass) {
        self.structural_wt += other.structural_wt;
        self.metabolic_wt += other.metabolic_wt;
        self.non_structural_wt += other.non_structural_wt;
        self.structural_n += other.structural_n;
        self.metabolic_n += other.metabolic_n;
        self.non_structural_n += other.non_structural_n;
    }

    pub fn subtract(&mut self, other: &Biomass) {
        self.structural_wt -= other.structural_wt;
        self.metabolic_wt -= other.metabolic_wt;
        self.non_structural_wt -= other.non_structural_wt;
        self.structural_n -= other.structural_n;
        self.metabolic_n -= other.metabolic_n;
        self.non_structural_n -= other.non_structural_n;
    }
}
